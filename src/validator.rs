use serde_json::Value;

/// タイトルの最大文字数（前後の空白を除いた後）
pub const TITLE_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("title must be between 1 and {TITLE_MAX_CHARS} characters")]
    InvalidTitle,
    #[error("content must be a string")]
    InvalidContent,
}

impl ValidationError {
    /// 問題のあるフィールド名
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::InvalidTitle => "title",
            ValidationError::InvalidContent => "content",
        }
    }
}

/// 検証済みのメモ入力
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoInput {
    pub title: String,
    pub content: String,
}

/// タイトルと内容を検証する。ストアにはアクセスしない
///
/// - タイトルは trim 後に 1〜200 文字
/// - 内容は文字列であること（未指定・null は空文字列として扱う）
pub fn validate(
    title: Option<&Value>,
    content: Option<&Value>,
) -> Result<MemoInput, ValidationError> {
    let title = match title {
        Some(Value::String(s)) => s.trim(),
        None | Some(Value::Null) => "",
        Some(_) => return Err(ValidationError::InvalidTitle),
    };
    let length = title.chars().count();
    if length == 0 || length > TITLE_MAX_CHARS {
        return Err(ValidationError::InvalidTitle);
    }

    let content = match content {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => String::new(),
        Some(_) => return Err(ValidationError::InvalidContent),
    };

    Ok(MemoInput {
        title: title.to_string(),
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trims_title_and_keeps_content_untouched() {
        let input = validate(
            Some(&json!("  Shopping List \n")),
            Some(&json!("  - milk\n- eggs  ")),
        )
        .unwrap();
        assert_eq!(input.title, "Shopping List");
        assert_eq!(input.content, "  - milk\n- eggs  ");
    }

    #[test]
    fn rejects_empty_and_blank_titles() {
        assert_eq!(
            validate(Some(&json!("")), Some(&json!("x"))),
            Err(ValidationError::InvalidTitle)
        );
        assert_eq!(
            validate(Some(&json!("   \t")), Some(&json!("x"))),
            Err(ValidationError::InvalidTitle)
        );
        assert_eq!(
            validate(None, Some(&json!("x"))),
            Err(ValidationError::InvalidTitle)
        );
    }

    #[test]
    fn title_length_is_bounded_after_trim() {
        let max = "a".repeat(TITLE_MAX_CHARS);
        assert!(validate(Some(&json!(max)), None).is_ok());

        let padded = format!("   {}   ", "a".repeat(TITLE_MAX_CHARS));
        assert!(validate(Some(&json!(padded)), None).is_ok());

        let too_long = "a".repeat(TITLE_MAX_CHARS + 1);
        assert_eq!(
            validate(Some(&json!(too_long)), None),
            Err(ValidationError::InvalidTitle)
        );
    }

    #[test]
    fn counts_characters_not_bytes() {
        let japanese = "メ".repeat(TITLE_MAX_CHARS);
        assert!(validate(Some(&json!(japanese)), None).is_ok());
    }

    #[test]
    fn non_string_title_is_invalid_title() {
        assert_eq!(
            validate(Some(&json!(42)), Some(&json!("x"))),
            Err(ValidationError::InvalidTitle)
        );
    }

    #[test]
    fn non_string_content_is_invalid_content() {
        let err = validate(Some(&json!("t")), Some(&json!({"a": 1}))).unwrap_err();
        assert_eq!(err, ValidationError::InvalidContent);
        assert_eq!(err.field(), "content");

        assert_eq!(
            validate(Some(&json!("t")), Some(&json!(12))),
            Err(ValidationError::InvalidContent)
        );
    }

    #[test]
    fn missing_content_becomes_empty_string() {
        let input = validate(Some(&json!("t")), Some(&Value::Null)).unwrap();
        assert_eq!(input.content, "");
        let input = validate(Some(&json!("t")), None).unwrap();
        assert_eq!(input.content, "");
    }

    #[test]
    fn error_message_names_the_field() {
        assert!(ValidationError::InvalidTitle.to_string().contains("title"));
        assert!(ValidationError::InvalidContent.to_string().contains("content"));
    }
}
