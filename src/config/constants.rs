pub const LOG_FILE_PATH: &str = "/tmp/tracechat.log";

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";

/// Placeholder title of a conversation until its first message is sent.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Max number of characters kept by a message preview (and derived titles).
pub const PREVIEW_MAX_CHARS: usize = 36;

pub const PREVIEW_ELLIPSIS: char = '…';

pub const STOPPED_NOTICE: &str = "[Stopped] Generation was stopped by the user.";

pub const ERROR_NOTICE_PREFIX: &str = "[Error]";

pub const CONVERSATIONS_KEY: &str = "tracechat.conversations";

pub const DEFAULT_MODEL_KEY: &str = "tracechat.default_model";
