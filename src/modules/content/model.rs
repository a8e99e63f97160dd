use crate::transcoding::profile::Resolution;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::Date;
use utoipa::ToSchema;
use uuid::Uuid;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq, ToSchema)]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(with = "iso_date")]
    #[schema(value_type = String, format = Date)]
    pub created_at: Date,
    /// Original upload, relative to the media root.
    pub video_file: Option<String>,
    pub video_480p: Option<String>,
    pub video_720p: Option<String>,
}

impl Video {
    pub fn rendition(&self, resolution: Resolution) -> Option<&str> {
        match resolution {
            Resolution::P480 => self.video_480p.as_deref(),
            Resolution::P720 => self.video_720p.as_deref(),
        }
    }

    pub fn rendition_mut(&mut self, resolution: Resolution) -> &mut Option<String> {
        match resolution {
            Resolution::P480 => &mut self.video_480p,
            Resolution::P720 => &mut self.video_720p,
        }
    }

    pub fn missing_renditions(&self) -> Vec<Resolution> {
        Resolution::ALL
            .into_iter()
            .filter(|r| self.rendition(*r).is_none())
            .collect()
    }
}

/// Fields supplied when a record is created; renditions always start empty.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub title: String,
    pub description: String,
    pub category: String,
    pub video_file: Option<String>,
}
