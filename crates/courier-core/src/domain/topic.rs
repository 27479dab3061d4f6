//! TopicNamer - 論理トピックから wire トピックへの変換
//!
//! publisher と subscriber は同じ `TopicNamer` を通すことで、
//! 同じ wire トピックに合意します。
//!
//! # 変換ルール
//! 1. `~` で始まる場合: `~` を外してそのまま使う（prefix を付けない）
//! 2. それ以外: prefix が空でなく、かつ topic が prefix で始まっていなければ
//!    `prefix/topic` に path-join する
//! 3. secret が空でなければ `@secret` を末尾に付ける

use serde::{Deserialize, Serialize};

/// Marker that bypasses namespace prefixing.
pub const ESCAPE_MARKER: char = '~';

/// Separator between the topic and the shared secret.
pub const SECRET_SEPARATOR: char = '@';

/// TopicNamer は (prefix, secret) を保持する純粋な変換器
///
/// # 使用例
/// ```
/// use courier_core::domain::TopicNamer;
///
/// let namer = TopicNamer::new("test", "secret");
/// assert_eq!(namer.wire_topic("hello"), "test/hello@secret");
/// assert_eq!(namer.wire_topic("~other/hello"), "other/hello@secret");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicNamer {
    prefix: String,
    secret: String,
}

impl TopicNamer {
    pub fn new(prefix: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            secret: secret.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Resolve a logical topic into the topic sent to the transport.
    pub fn wire_topic(&self, logical: &str) -> String {
        let mut topic = match logical.strip_prefix(ESCAPE_MARKER) {
            Some(verbatim) => verbatim.to_string(),
            None if !self.prefix.is_empty() && !logical.starts_with(&self.prefix) => {
                join_path(&self.prefix, logical)
            }
            None => logical.to_string(),
        };

        if !self.secret.is_empty() {
            topic.push(SECRET_SEPARATOR);
            topic.push_str(&self.secret);
        }
        topic
    }
}

/// Join two path fragments with `/` and clean the result.
///
/// Empty and `.` segments collapse, `..` removes the previous segment, and a
/// leading `/` on `base` keeps the result rooted.
fn join_path(base: &str, tail: &str) -> String {
    let rooted = base.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in base.split('/').chain(tail.split('/')) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            s => segments.push(s),
        }
    }

    let joined = segments.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}
