use approx::assert_relative_eq;
use ndarray::Array2;
use pfs_datamodel::{
    Arm, CalibIdentity, Error, FitsProduct, MaskedArray, Metadata, MetadataValue,
    PfsFiberProfiles, Product,
};

fn identity() -> CalibIdentity {
    CalibIdentity::new("2024-01-02", 1, Arm::Blue, 42).unwrap()
}

/// Three fibers: a masked pair of profiles (one masked sample is NaN), no
/// profiles at all, and a single unmasked profile with a normalisation vector.
fn profiles(metadata: Metadata) -> PfsFiberProfiles {
    let mut data = Array2::from_shape_fn((2, 13), |(r, c)| (c as f32 - 6.0).abs() + r as f32);
    let mut mask = Array2::from_elem((2, 13), false);
    data[(0, 12)] = f32::NAN;
    mask[(0, 12)] = true;
    mask[(1, 3)] = true;
    let wide = Array2::from_shape_fn((1, 31), |(_, c)| c as f32 / 31.0);

    PfsFiberProfiles::new(
        identity(),
        vec![5, 7, 651],
        vec![1, 1, 5],
        vec![3.0, 3.0, 2.5],
        vec![vec![10.0, 2048.5], vec![], vec![4000.0]],
        vec![
            MaskedArray::new(data, Some(mask)).unwrap(),
            MaskedArray::empty(13),
            MaskedArray::unmasked(wide),
        ],
        vec![vec![], vec![], vec![1.0, 0.5, 0.25]],
        metadata,
    )
    .unwrap()
}

#[test]
fn write_then_read_by_identity() {
    let dir = tempfile::tempdir().unwrap();
    let original = profiles(Metadata::new().with("VISIT0", 42).with("DETECTOR", "b1"));

    let path = original.write(dir.path()).unwrap();
    assert_eq!(
        path.file_name().unwrap(),
        "pfsFiberProfiles-2024-01-02-000042-b1.fits"
    );

    let back = PfsFiberProfiles::read(&identity(), dir.path()).unwrap();
    assert_eq!(back, original);
    assert_eq!(back.len(), 3);
    assert_eq!(back.profiles()[1].data().dim(), (0, 13));
    assert_eq!(back.profiles()[0].count_masked(), 2);
    assert!(back.profiles()[0].is_masked(1, 3));
    assert!(back.profiles()[2].mask().is_none());
    assert_eq!(back.norm()[2], vec![1.0, 0.5, 0.25]);
}

#[test]
fn read_fits_takes_identity_from_filename() {
    let dir = tempfile::tempdir().unwrap();
    let original = profiles(Metadata::new());
    let path = original.write(dir.path()).unwrap();

    let back = PfsFiberProfiles::read_fits(&path).unwrap();
    assert_eq!(back.identity(), &identity());
    assert_eq!(back, original);
}

#[test]
fn gzipped_files_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let original = profiles(Metadata::new().with("CALIB", true));
    let path = dir
        .path()
        .join(format!("{}.gz", original.filename().unwrap()));

    original.write_fits(&path).unwrap();
    let raw = std::fs::read(&path).unwrap();
    assert_eq!(&raw[..2], &[0x1f, 0x8b]);

    let back = PfsFiberProfiles::read_fits(&path).unwrap();
    assert_eq!(back, original);
}

#[test]
fn multi_member_gzip_files_are_read() {
    let dir = tempfile::tempdir().unwrap();
    let original = profiles(Metadata::new().with("VISIT0", 42));
    let bytes = original.to_fits().unwrap().into_bytes();
    let (head, tail) = bytes.split_at(bytes.len() / 3);

    let mut packed = pfs_fits::io::gzip(head).unwrap();
    packed.extend(pfs_fits::io::gzip(tail).unwrap());
    let path = dir
        .path()
        .join(format!("{}.gz", original.filename().unwrap()));
    std::fs::write(&path, packed).unwrap();

    let back = PfsFiberProfiles::read_fits(&path).unwrap();
    assert_eq!(back, original);
}

#[test]
fn metadata_survives_without_the_product_marker() {
    let dir = tempfile::tempdir().unwrap();
    let metadata = Metadata::new()
        .with("exptime", 30.5)
        .with("W_ARM", "b")
        .with("PFS.DETECTOR.SERIAL", 17);
    let path = profiles(metadata).write(dir.path()).unwrap();

    let back = PfsFiberProfiles::read_fits(&path).unwrap();
    let metadata = back.metadata();
    assert_eq!(metadata.len(), 3);
    assert!(metadata.get("OBSTYPE").is_none());
    match metadata.get("EXPTIME") {
        Some(MetadataValue::Float(v)) => assert_relative_eq!(*v, 30.5),
        other => panic!("unexpected EXPTIME {other:?}"),
    }
    assert_eq!(
        metadata.get("W_ARM"),
        Some(&MetadataValue::Str("b".to_string()))
    );
    assert_eq!(
        metadata.get("PFS.DETECTOR.SERIAL"),
        Some(&MetadataValue::Int(17))
    );
}

#[test]
fn valueless_keywords_are_not_written() {
    let dir = tempfile::tempdir().unwrap();
    for metadata in [
        Metadata::new().with("COMMENT", 5).with("HISTORY", "x"),
        Metadata::new().with("HIERARCH", 5),
    ] {
        assert!(matches!(
            profiles(metadata).write(dir.path()),
            Err(Error::Metadata { .. })
        ));
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        PfsFiberProfiles::read(&identity(), dir.path()),
        Err(Error::Io(_))
    ));
}

#[test]
fn unparseable_name_is_rejected_before_opening() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profiles.fits");
    profiles(Metadata::new()).write_fits(&path).unwrap();

    assert!(matches!(
        PfsFiberProfiles::read_fits(&path),
        Err(Error::Parse {
            product: "PfsFiberProfiles",
            ..
        })
    ));
    assert_eq!(
        PfsFiberProfiles::parse_filename(dir.path().join("pfsFiberProfiles-2024-01-02-000042-b1.fits"))
            .unwrap(),
        identity()
    );
}

#[test]
fn file_without_profile_tables_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pfsFiberProfiles-2024-01-02-000042-b1.fits");
    pfs_fits::FitsBuilder::new(&[])
        .unwrap()
        .write_to(&path)
        .unwrap();

    assert!(matches!(
        PfsFiberProfiles::read_fits(&path),
        Err(Error::Fits(pfs_fits::Error::MissingExtension(_)))
    ));
}
