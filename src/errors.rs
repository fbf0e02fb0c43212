use std::fmt;

#[derive(Debug, Clone)]
pub enum ShortlinkError {
    DatabaseConnection(String),
    DatabaseOperation(String),
    FileOperation(String),
    Serialization(String),
    Validation(String),
    AlreadyExists(String),
    QueueClosed(String),
    StoragePluginNotFound(String),
}

impl ShortlinkError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ShortlinkError::DatabaseConnection(_) => "E001",
            ShortlinkError::DatabaseOperation(_) => "E002",
            ShortlinkError::FileOperation(_) => "E003",
            ShortlinkError::Serialization(_) => "E004",
            ShortlinkError::Validation(_) => "E005",
            ShortlinkError::AlreadyExists(_) => "E006",
            ShortlinkError::QueueClosed(_) => "E007",
            ShortlinkError::StoragePluginNotFound(_) => "E008",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            ShortlinkError::DatabaseConnection(_) => "Database Connection Error",
            ShortlinkError::DatabaseOperation(_) => "Database Operation Error",
            ShortlinkError::FileOperation(_) => "File Operation Error",
            ShortlinkError::Serialization(_) => "Serialization Error",
            ShortlinkError::Validation(_) => "Validation Error",
            ShortlinkError::AlreadyExists(_) => "Link Already Exists",
            ShortlinkError::QueueClosed(_) => "Deletion Queue Closed",
            ShortlinkError::StoragePluginNotFound(_) => "Storage Plugin Not Found",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            ShortlinkError::DatabaseConnection(msg) => msg,
            ShortlinkError::DatabaseOperation(msg) => msg,
            ShortlinkError::FileOperation(msg) => msg,
            ShortlinkError::Serialization(msg) => msg,
            ShortlinkError::Validation(msg) => msg,
            ShortlinkError::AlreadyExists(msg) => msg,
            ShortlinkError::QueueClosed(msg) => msg,
            ShortlinkError::StoragePluginNotFound(msg) => msg,
        }
    }

    /// 介质不可达或介质 I/O 故障，调用方应当映射为服务端错误
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(
            self,
            ShortlinkError::DatabaseConnection(_)
                | ShortlinkError::DatabaseOperation(_)
                | ShortlinkError::FileOperation(_)
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for ShortlinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for ShortlinkError {}

// 便捷的构造函数
impl ShortlinkError {
    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        ShortlinkError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        ShortlinkError::DatabaseOperation(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        ShortlinkError::FileOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        ShortlinkError::Serialization(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        ShortlinkError::Validation(msg.into())
    }

    pub fn already_exists<T: Into<String>>(msg: T) -> Self {
        ShortlinkError::AlreadyExists(msg.into())
    }

    pub fn queue_closed<T: Into<String>>(msg: T) -> Self {
        ShortlinkError::QueueClosed(msg.into())
    }

    pub fn storage_plugin_not_found<T: Into<String>>(msg: T) -> Self {
        ShortlinkError::StoragePluginNotFound(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for ShortlinkError {
    fn from(err: sea_orm::DbErr) -> Self {
        ShortlinkError::DatabaseOperation(err.to_string())
    }
}

impl From<std::io::Error> for ShortlinkError {
    fn from(err: std::io::Error) -> Self {
        ShortlinkError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for ShortlinkError {
    fn from(err: serde_json::Error) -> Self {
        ShortlinkError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShortlinkError>;
