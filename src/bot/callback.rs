use teloxide::types::UserId;

use crate::quiz::ChoiceLabel;

const PREFIX: &str = "quiz";

/// Payload of an answer button: whose quiz, which question, which label.
///
/// Encoded as `quiz:<owner>:<position>:<label>`, well under Telegram's
/// 64-byte callback data limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerCallback {
    pub owner: UserId,
    pub position: usize,
    pub label: ChoiceLabel,
}

impl AnswerCallback {
    pub fn encode(&self) -> String {
        format!("{}:{}:{}:{}", PREFIX, self.owner.0, self.position, self.label)
    }

    pub fn parse(data: &str) -> Option<Self> {
        let mut parts = data.split(':');
        if parts.next()? != PREFIX {
            return None;
        }
        let owner = UserId(parts.next()?.parse().ok()?);
        let position = parts.next()?.parse().ok()?;
        let label = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            owner,
            position,
            label,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_owner_position_and_label() {
        let press = AnswerCallback {
            owner: UserId(123456789),
            position: 3,
            label: ChoiceLabel::C,
        };
        assert_eq!(press.encode(), "quiz:123456789:3:C");
        assert_eq!(AnswerCallback::parse("quiz:123456789:3:C"), Some(press));
    }

    #[test]
    fn rejects_malformed_data() {
        for data in [
            "",
            "quiz",
            "poll:1:0:A",
            "quiz:abc:0:A",
            "quiz:1:-1:A",
            "quiz:1:0:a",
            "quiz:1:0:E",
            "quiz:1:0:A:extra",
        ] {
            assert_eq!(AnswerCallback::parse(data), None, "{:?}", data);
        }
    }
}
