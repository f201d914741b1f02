use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    VersionInvalidFormat,

    RequestInvalid,

    BuildDownloadFailed,
    BuildCommandFailed,
    BuildPackagingFailed,

    ReleaseCreationFailed,
    ReleasePublishFailed,
    ReleaseUploadFailed,

    ConfigMissingKey,
    ConfigInvalidValue,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::VersionInvalidFormat => "version.invalid_format",

            ErrorCode::RequestInvalid => "request.invalid",

            ErrorCode::BuildDownloadFailed => "build.download_failed",
            ErrorCode::BuildCommandFailed => "build.command_failed",
            ErrorCode::BuildPackagingFailed => "build.packaging_failed",

            ErrorCode::ReleaseCreationFailed => "release.creation_failed",
            ErrorCode::ReleasePublishFailed => "release.publish_failed",
            ErrorCode::ReleaseUploadFailed => "release.upload_failed",

            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidVersionDetails {
    pub raw: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidRequestDetails {
    pub argument: String,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadFailedDetails {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFailedDetails {
    pub stage: String,
    pub command: String,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagingFailedDetails {
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseFailedDetails {
    pub tag: String,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFailedDetails {
    pub tag: String,
    pub asset: String,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    fn with_details<T: Serialize>(code: ErrorCode, message: impl Into<String>, details: T) -> Self {
        let details =
            serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(code, message, details)
    }

    pub fn invalid_version_format(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self::with_details(
            ErrorCode::VersionInvalidFormat,
            format!("No version triple found in '{}'", raw),
            InvalidVersionDetails { raw },
        )
        .with_hint("Versions must contain a dotted (1.2.3) or underscored (1_2_3) triple")
    }

    pub fn invalid_request(argument: impl Into<String>, problem: impl Into<String>) -> Self {
        Self::with_details(
            ErrorCode::RequestInvalid,
            "Malformed extension request",
            InvalidRequestDetails {
                argument: argument.into(),
                problem: problem.into(),
            },
        )
        .with_hint("Requests are comma-separated triples: name,version,sourceUrl")
    }

    pub fn download_failed(
        url: impl Into<String>,
        status: Option<u16>,
        error: Option<String>,
    ) -> Self {
        Self::with_details(
            ErrorCode::BuildDownloadFailed,
            "Source archive download failed",
            DownloadFailedDetails {
                url: url.into(),
                status,
                error,
            },
        )
    }

    pub fn build_command_failed(
        stage: impl Into<String>,
        command: impl Into<String>,
        exit_code: i32,
        output: impl Into<String>,
    ) -> Self {
        let stage = stage.into();
        Self::with_details(
            ErrorCode::BuildCommandFailed,
            format!("Build stage '{}' failed (exit code {})", stage, exit_code),
            CommandFailedDetails {
                stage,
                command: command.into(),
                exit_code,
                output: output.into(),
            },
        )
    }

    pub fn packaging_failed(
        problem: impl Into<String>,
        exit_code: Option<i32>,
        output: Option<String>,
    ) -> Self {
        Self::with_details(
            ErrorCode::BuildPackagingFailed,
            "Packaging failed",
            PackagingFailedDetails {
                problem: problem.into(),
                exit_code,
                output,
            },
        )
    }

    pub fn release_creation_failed(tag: impl Into<String>, problem: impl Into<String>) -> Self {
        Self::with_details(
            ErrorCode::ReleaseCreationFailed,
            "Release creation failed",
            ReleaseFailedDetails {
                tag: tag.into(),
                problem: problem.into(),
            },
        )
    }

    pub fn publish_failed(tag: impl Into<String>, problem: impl Into<String>) -> Self {
        Self::with_details(
            ErrorCode::ReleasePublishFailed,
            "Release publish failed",
            ReleaseFailedDetails {
                tag: tag.into(),
                problem: problem.into(),
            },
        )
    }

    pub fn upload_failed(
        tag: impl Into<String>,
        asset: impl Into<String>,
        problem: impl Into<String>,
    ) -> Self {
        Self::with_details(
            ErrorCode::ReleaseUploadFailed,
            "Asset upload failed",
            UploadFailedDetails {
                tag: tag.into(),
                asset: asset.into(),
                problem: problem.into(),
            },
        )
        .with_hint("The release record may exist without its asset; remove it before re-running")
    }

    pub fn config_missing_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::with_details(
            ErrorCode::ConfigMissingKey,
            format!("Missing required configuration: {}", key),
            ConfigMissingKeyDetails { key },
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        Self::with_details(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            ConfigInvalidValueDetails {
                key: key.into(),
                value,
                problem: problem.into(),
            },
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        Self::with_details(
            ErrorCode::InternalIoError,
            "IO error",
            InternalIoErrorDetails {
                error: error.into(),
                context,
            },
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::with_details(
            ErrorCode::InternalJsonError,
            "JSON error",
            InternalIoErrorDetails {
                error: error.into(),
                context,
            },
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }
}
