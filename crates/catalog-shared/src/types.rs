use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a stored or submitted enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

// Every enum here is stored as its upper-case name, both in SQLite and on the wire.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Comma separated list of accepted values, used in validation messages.
            pub fn allowed() -> String {
                Self::ALL
                    .iter()
                    .map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    Student,
    Admin,
    Teacher,
}

text_enum!(Role, "role", {
    Student => "STUDENT",
    Admin => "ADMIN",
    Teacher => "TEACHER",
});

/// Account status of a user. Independent of the `is_active` soft-delete flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
}

text_enum!(UserStatus, "user status", {
    Active => "ACTIVE",
    Inactive => "INACTIVE",
});

/// Publication status of a course. New courses start out `Inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseStatus {
    Active,
    #[default]
    Inactive,
}

text_enum!(CourseStatus, "course status", {
    Active => "ACTIVE",
    Inactive => "INACTIVE",
});

/// Kind of content carried by course media, subsections and resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    Image,
    Video,
    Pdf,
    Document,
    Link,
    #[serde(rename = "VIDEOID")]
    VideoId,
}

text_enum!(MediaType, "media type", {
    Image => "IMAGE",
    Video => "VIDEO",
    Pdf => "PDF",
    Document => "DOCUMENT",
    Link => "LINK",
    VideoId => "VIDEOID",
});

impl MediaType {
    /// File kinds need an uploaded file; the others carry a link in the body.
    pub fn is_file(&self) -> bool {
        matches!(
            self,
            MediaType::Image | MediaType::Video | MediaType::Pdf | MediaType::Document
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_round_trip_names() {
        for ty in MediaType::ALL {
            assert_eq!(ty.as_str().parse::<MediaType>().unwrap(), *ty);
        }
        assert_eq!(
            serde_json::to_string(&MediaType::VideoId).unwrap(),
            "\"VIDEOID\""
        );
    }

    #[test]
    fn test_unknown_value_rejected() {
        let err = "AUDIO".parse::<MediaType>().unwrap_err();
        assert_eq!(err.value, "AUDIO");
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_allowed_list() {
        assert_eq!(
            MediaType::allowed(),
            "IMAGE, VIDEO, PDF, DOCUMENT, LINK, VIDEOID"
        );
        assert_eq!(CourseStatus::allowed(), "ACTIVE, INACTIVE");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Role::default(), Role::Student);
        assert_eq!(CourseStatus::default(), CourseStatus::Inactive);
        assert_eq!(UserStatus::default(), UserStatus::Active);
    }

    #[test]
    fn test_file_kinds() {
        assert!(MediaType::Pdf.is_file());
        assert!(!MediaType::Link.is_file());
        assert!(!MediaType::VideoId.is_file());
    }
}
