use crossterm::style::Color;

#[macro_export]
macro_rules! info_notice {
    ($msg:expr) => {
        $crate::models::NoticeMessage::info($msg)
    };
}

#[macro_export]
macro_rules! warn_notice {
    ($msg:expr) => {
        $crate::models::NoticeMessage::warning($msg)
    };
}

#[macro_export]
macro_rules! error_notice {
    ($msg:expr) => {
        $crate::models::NoticeMessage::error($msg)
    };
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    #[default]
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct NoticeMessage {
    message: String,
    kind: NoticeKind,
}

impl NoticeMessage {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Info,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Warning,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Error,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &NoticeKind {
        &self.kind
    }
}

impl NoticeKind {
    pub fn color(&self) -> Color {
        match self {
            NoticeKind::Info => Color::Rgb {
                r: 144,
                g: 202,
                b: 249,
            },
            NoticeKind::Warning => Color::Rgb {
                r: 255,
                g: 213,
                b: 79,
            },
            NoticeKind::Error => Color::Rgb {
                r: 255,
                g: 138,
                b: 128,
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NoticeKind::Info => "info",
            NoticeKind::Warning => "warning",
            NoticeKind::Error => "error",
        }
    }
}
