use serde::{Deserialize, Serialize};

/// 一条短链接记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub short_url: String,
    pub original_url: String,
    pub owner_id: String,
    pub deleted: bool,
}

impl LinkRecord {
    pub fn new(
        short_url: impl Into<String>,
        original_url: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        LinkRecord {
            short_url: short_url.into(),
            original_url: original_url.into(),
            owner_id: owner_id.into(),
            deleted: false,
        }
    }
}

/// Insert 的两种结局。重复不是失败：携带已存在记录的短链接码返回，
/// 调用方自行区分「已写入」和「早已存在」
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// 新记录已写入
    Created(String),
    /// 相同 original_url 的未删除记录已存在
    Duplicate(String),
}

impl InsertOutcome {
    pub fn short_url(&self) -> &str {
        match self {
            InsertOutcome::Created(code) | InsertOutcome::Duplicate(code) => code,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, InsertOutcome::Duplicate(_))
    }
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// 文件后端的行格式：每行一个 JSON 对象。
/// 匿名且存活的记录只序列化 short_url / original_url 两个字段，
/// owner_id / deleted 缺省时按空 owner、未删除解码，旧文件照常可读
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LinkLine {
    pub short_url: String,
    pub original_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

impl From<LinkRecord> for LinkLine {
    fn from(record: LinkRecord) -> Self {
        LinkLine {
            short_url: record.short_url,
            original_url: record.original_url,
            owner_id: record.owner_id,
            deleted: record.deleted,
        }
    }
}

impl From<LinkLine> for LinkRecord {
    fn from(line: LinkLine) -> Self {
        LinkRecord {
            short_url: line.short_url,
            original_url: line.original_url,
            owner_id: line.owner_id,
            deleted: line.deleted,
        }
    }
}

/// 按 owner 列出时的条目
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OwnedLink {
    pub short_url: String,
    pub original_url: String,
}
