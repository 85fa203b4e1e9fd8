//! FITS header card parsing and writing.
//!
//! Keywords of up to eight characters from `[A-Z0-9_-]` are written as
//! standard cards. Anything else that carries a value is written with the
//! ESO `HIERARCH` convention (`HIERARCH long.key = value / comment`), which is
//! how most astronomy software stores long keyword names.

use core::str;

use crate::block::{pad_to_block, BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE, HEADER_PAD_BYTE};
use crate::error::{Error, Result};
use crate::value::{format_value, is_fixed_format, parse_value, Value};

/// Prefix of a long-keyword card.
pub const HIERARCH: &str = "HIERARCH";

/// One header card.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    /// Keyword name, without padding. For `HIERARCH` cards this is the long
    /// name that follows the prefix.
    pub keyword: String,
    /// The value, if the card has a value indicator and a defined value.
    pub value: Option<Value>,
    /// Comment text (or free text for commentary cards).
    pub comment: Option<String>,
}

impl Card {
    /// A card carrying a value and no comment.
    pub fn new(keyword: impl Into<String>, value: Value) -> Self {
        Card {
            keyword: keyword.into(),
            value: Some(value),
            comment: None,
        }
    }

    /// Attach a comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Returns `true` if this card is the END keyword.
    pub fn is_end(&self) -> bool {
        self.keyword == "END"
    }

    /// Returns `true` for COMMENT, HISTORY and blank-keyword cards.
    pub fn is_commentary(&self) -> bool {
        matches!(self.keyword.as_str(), "COMMENT" | "HISTORY" | "")
    }
}

/// Can `keyword` be written in the first eight columns of a card?
pub fn is_standard_keyword(keyword: &str) -> bool {
    !keyword.is_empty()
        && keyword.len() <= 8
        && keyword
            .bytes()
            .all(|b| matches!(b, b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_'))
}

/// Keywords that describe the container structure rather than its content.
/// They are written by the codec itself and never taken from caller metadata.
pub fn is_reserved_keyword(keyword: &str) -> bool {
    const FIXED: [&str; 13] = [
        "SIMPLE", "BITPIX", "NAXIS", "EXTEND", "XTENSION", "PCOUNT", "GCOUNT", "TFIELDS",
        "THEAP", "EXTNAME", "INHERIT", "GROUPS", "END",
    ];
    const INDEXED: [&str; 4] = ["NAXIS", "TTYPE", "TFORM", "TDIM"];

    FIXED.contains(&keyword)
        || INDEXED.iter().any(|prefix| {
            keyword
                .strip_prefix(prefix)
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        })
}

// ── Parsing ──

/// Parse a single 80-byte card.
pub fn parse_card(card_bytes: &[u8; CARD_SIZE]) -> Result<Card> {
    if !card_bytes.is_ascii() {
        return Err(Error::InvalidHeader("header card contains non-ASCII bytes"));
    }
    let text = str::from_utf8(card_bytes).map_err(|_| Error::InvalidHeader("bad card"))?;
    let name = text[..8].trim_end();

    if !name
        .bytes()
        .all(|b| matches!(b, b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_'))
    {
        return Err(Error::InvalidKeyword(name.to_string()));
    }

    let free_text = |s: &str| {
        let s = s.trim_end();
        (!s.is_empty()).then(|| s.to_string())
    };

    if name == "END" || matches!(name, "COMMENT" | "HISTORY" | "") {
        return Ok(Card {
            keyword: name.to_string(),
            value: None,
            comment: if name == "END" { None } else { free_text(&text[8..]) },
        });
    }

    if name == HIERARCH {
        let rest = &text[8..];
        if let Some(eq) = rest.find('=') {
            let long_name = rest[..eq].trim();
            if long_name.is_empty() {
                return Err(Error::InvalidKeyword(String::from(HIERARCH)));
            }
            let (value, comment) = parse_value(&rest[eq + 1..]);
            return Ok(Card {
                keyword: long_name.to_string(),
                value,
                comment,
            });
        }
    }

    if &text[8..10] == "= " {
        let (value, comment) = parse_value(&text[10..]);
        return Ok(Card {
            keyword: name.to_string(),
            value,
            comment,
        });
    }

    Ok(Card {
        keyword: name.to_string(),
        value: None,
        comment: free_text(&text[8..]),
    })
}

/// Parse header blocks until the END card.
///
/// Returns the cards (END excluded) and the number of bytes the header
/// occupies, which is always a whole number of blocks.
pub fn parse_header(data: &[u8]) -> Result<(Vec<Card>, usize)> {
    let mut cards = Vec::new();
    let num_blocks = data.len() / BLOCK_SIZE;

    for block_idx in 0..num_blocks {
        let block_start = block_idx * BLOCK_SIZE;
        for card_idx in 0..CARDS_PER_BLOCK {
            let card_start = block_start + card_idx * CARD_SIZE;
            let card_bytes: &[u8; CARD_SIZE] = data[card_start..card_start + CARD_SIZE]
                .try_into()
                .map_err(|_| Error::InvalidHeader("truncated card"))?;
            let card = parse_card(card_bytes)?;
            if card.is_end() {
                return Ok((cards, (block_idx + 1) * BLOCK_SIZE));
            }
            cards.push(card);
        }
    }

    Err(Error::UnexpectedEof)
}

// ── Writing ──

fn check_printable(keyword: &str, text: &str) -> Result<()> {
    if text.chars().all(|c| (' '..='~').contains(&c)) {
        Ok(())
    } else {
        Err(Error::invalid_value(keyword, "text is not printable ASCII"))
    }
}

/// Serialize a card into an 80-byte card image.
pub fn format_card(card: &Card) -> Result<[u8; CARD_SIZE]> {
    let keyword = card.keyword.as_str();
    let mut line = String::with_capacity(CARD_SIZE);

    if card.is_commentary() && card.value.is_some() {
        return Err(Error::invalid_value(keyword, "commentary cards carry no value"));
    }
    if keyword == HIERARCH && card.value.is_some() {
        return Err(Error::InvalidKeyword(keyword.to_string()));
    }

    if card.is_end() {
        line.push_str("END");
    } else if card.is_commentary() || card.value.is_none() {
        if !(card.is_commentary() || is_standard_keyword(keyword)) {
            return Err(Error::InvalidKeyword(keyword.to_string()));
        }
        line.push_str(&format!("{keyword:<8}"));
        if let Some(text) = &card.comment {
            check_printable(keyword, text)?;
            line.push_str(&text[..text.len().min(CARD_SIZE - 8)]);
        }
    } else if let Some(value) = &card.value {
        let text = format_value(keyword, value)?;
        if is_standard_keyword(keyword) {
            line.push_str(&format!("{keyword:<8}= "));
            if is_fixed_format(value) && text.len() <= 20 {
                line.push_str(&format!("{text:>20}"));
            } else {
                line.push_str(&text);
            }
        } else {
            check_printable(keyword, keyword)?;
            if keyword.trim().is_empty() || keyword.contains('=') {
                return Err(Error::InvalidKeyword(keyword.to_string()));
            }
            line.push_str(&format!("{HIERARCH} {keyword} = {text}"));
        }
        if line.len() > CARD_SIZE {
            return Err(Error::invalid_value(
                keyword,
                "value does not fit on a single card",
            ));
        }
        if let Some(comment) = &card.comment {
            check_printable(keyword, comment)?;
            let room = CARD_SIZE - line.len();
            if room > 3 {
                line.push_str(" / ");
                line.push_str(&comment[..comment.len().min(room - 3)]);
            }
        }
    }

    let mut buf = [b' '; CARD_SIZE];
    buf[..line.len()].copy_from_slice(line.as_bytes());
    Ok(buf)
}

/// Serialize cards into complete header blocks, appending END and padding
/// the final block with blanks.
pub fn serialize_header(cards: &[Card]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity((cards.len() + 1) * CARD_SIZE);
    for card in cards {
        buf.extend_from_slice(&format_card(card)?);
    }
    let end = Card {
        keyword: String::from("END"),
        value: None,
        comment: None,
    };
    buf.extend_from_slice(&format_card(&end)?);
    pad_to_block(&mut buf, HEADER_PAD_BYTE);
    Ok(buf)
}

// ── Lookup ──

/// First card with the given keyword.
pub fn find_card<'a>(cards: &'a [Card], keyword: &str) -> Option<&'a Card> {
    cards.iter().find(|c| c.keyword == keyword)
}

/// Integer value of a keyword, if present and integral.
pub fn card_integer(cards: &[Card], keyword: &str) -> Option<i64> {
    match find_card(cards, keyword)?.value {
        Some(Value::Integer(n)) => Some(n),
        _ => None,
    }
}

/// String value of a keyword, if present and a string.
pub fn card_string<'a>(cards: &'a [Card], keyword: &str) -> Option<&'a str> {
    match &find_card(cards, keyword)?.value {
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

/// Integer value of a mandatory keyword.
pub fn require_integer(cards: &[Card], keyword: &str) -> Result<i64> {
    card_integer(cards, keyword).ok_or_else(|| Error::MissingKeyword(keyword.to_string()))
}
