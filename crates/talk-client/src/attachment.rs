//! Attachment builders for mentions and emoticons.

use crate::error::DispatchError;
use crate::types::Mention;
use serde_json::{json, Value};

/// Emoticon numbers available in the bundled pack.
pub const EMOTICON_RANGE: std::ops::RangeInclusive<u32> = 1..=88;

const EMOTICON_PACK: &str = "2212560";

/// Render a mention into its message text and attachment.
pub fn mention(mention: &Mention) -> Result<(String, Value), DispatchError> {
    if mention.name.is_empty() {
        return Err(DispatchError::invalid("mention name is empty"));
    }

    let suffix = if mention.text.is_empty() {
        String::new()
    } else {
        format!(" {}", mention.text)
    };
    let (text, at) = if mention.bracketed {
        (format!("[ @{} ]{}", mention.name, suffix), 3)
    } else {
        (format!("@{}{}", mention.name, suffix), 1)
    };

    let attachment = json!({
        "mentions": [{
            "user_id": mention.user_id,
            "at": [at],
            "len": mention.name.chars().count(),
        }]
    });
    Ok((text, attachment))
}

/// Sticker attachment for emoticon `number`.
pub fn emoticon(number: u32) -> Result<Value, DispatchError> {
    if !EMOTICON_RANGE.contains(&number) {
        return Err(DispatchError::invalid(format!(
            "emoticon number {} is outside {}..={}",
            number,
            EMOTICON_RANGE.start(),
            EMOTICON_RANGE.end()
        )));
    }

    Ok(json!({
        "type": "sticker/digital-item",
        "path": format!("{}.emot_{:03}.png", EMOTICON_PACK, number),
        "name": "(이모티콘)",
        "sound": "",
        "width": "360",
        "height": "360",
        "msg": "",
        "alt": "하트뿅뿅 어피치이모티콘",
        "welcome": false,
    }))
}
