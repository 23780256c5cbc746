//! Static table of ML routes.
//!
//! # Responsibilities
//! - Describe each inbound ML route and the downstream call it maps to
//! - Fix the upload field names, decoder and timeout class per route
//!
//! # Design Decisions
//! - The table is code, not config: the downstream APIs are fixed
//! - Every route posts to `<family base>/<downstream path>`

use crate::proxy::Decoder;

/// Downstream service family; each has its own base URL and Transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    General,
    Audio,
    TimeSeries,
}

impl Family {
    pub const ALL: [Family; 3] = [Family::General, Family::Audio, Family::TimeSeries];

    pub fn name(self) -> &'static str {
        match self {
            Family::General => "general",
            Family::Audio => "audio",
            Family::TimeSeries => "timeseries",
        }
    }
}

/// Which configured deadline governs a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    Media,
    Message,
}

/// How the inbound request body is turned into an outbound one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// Multipart form: listed text fields plus one required file.
    Upload {
        fields: &'static [&'static str],
        file_field: &'static str,
        filename: &'static str,
    },
    /// JSON `{ "message": string }` forwarded as JSON.
    Message,
}

/// Field name of the file part every upload is re-sent under.
pub const OUTBOUND_FILE_FIELD: &str = "filedata";

/// The ML routes served under `/ml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MlRoute {
    Image,
    Message,
    Track,
    Melody,
    TimeSeries,
}

impl MlRoute {
    pub const ALL: [MlRoute; 5] = [
        MlRoute::Image,
        MlRoute::Message,
        MlRoute::Track,
        MlRoute::Melody,
        MlRoute::TimeSeries,
    ];

    /// Label used in logs and metrics.
    pub fn name(self) -> &'static str {
        match self {
            MlRoute::Image => "image",
            MlRoute::Message => "message",
            MlRoute::Track => "track",
            MlRoute::Melody => "melody",
            MlRoute::TimeSeries => "ts",
        }
    }

    pub fn inbound_path(self) -> &'static str {
        match self {
            MlRoute::Image => "/ml/image",
            MlRoute::Message => "/ml/message",
            MlRoute::Track => "/ml/track",
            MlRoute::Melody => "/ml/melody",
            MlRoute::TimeSeries => "/ml/ts",
        }
    }

    pub fn family(self) -> Family {
        match self {
            MlRoute::Image | MlRoute::Message => Family::General,
            MlRoute::Track | MlRoute::Melody => Family::Audio,
            MlRoute::TimeSeries => Family::TimeSeries,
        }
    }

    /// Path appended to the family base URL.
    pub fn downstream_path(self) -> &'static str {
        self.name()
    }

    pub fn extraction(self) -> Extraction {
        match self {
            MlRoute::Image => Extraction::Upload {
                fields: &["message"],
                file_field: "image",
                filename: "test.png",
            },
            MlRoute::Melody => Extraction::Upload {
                fields: &["message"],
                file_field: "audio",
                filename: "test.wav",
            },
            MlRoute::TimeSeries => Extraction::Upload {
                fields: &["predictor", "target"],
                file_field: "ts",
                filename: "test.csv",
            },
            MlRoute::Message | MlRoute::Track => Extraction::Message,
        }
    }

    pub fn decoder(self) -> Decoder {
        match self {
            MlRoute::TimeSeries => Decoder::TimeSeries,
            _ => Decoder::Raw,
        }
    }

    pub fn timeout_class(self) -> TimeoutClass {
        match self {
            MlRoute::Message | MlRoute::Track => TimeoutClass::Message,
            _ => TimeoutClass::Media,
        }
    }

    /// Content type of a successful binary response; `None` for JSON routes.
    pub fn media_type(self) -> Option<&'static str> {
        match self {
            MlRoute::Image | MlRoute::Message => Some("image/png"),
            MlRoute::Track | MlRoute::Melody => Some("audio/wav"),
            MlRoute::TimeSeries => None,
        }
    }
}
