//! Map view for a device location.
//!
//! Rendering the map is delegated to Google Maps. This module only builds
//! what the browser needs to open it: a popup document embedding the place
//! view, and a plain URL to fall back on when popups are blocked or no embed
//! API key is configured.

use serde::Serialize;
use thiserror::Error;

use crate::model::{Alert, format_coordinate};
use crate::render::escape_html;

/// Embed endpoint used inside the popup document.
const EMBED_BASE: &str = "https://www.google.com/maps/embed/v1/place";

/// Public map URL used as a fallback.
const FALLBACK_BASE: &str = "https://www.google.com/maps";

const ZOOM: u8 = 15;

/// Window features for the popup.
pub const POPUP_FEATURES: &str = "width=800,height=600";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("Invalid location data provided.")]
    MissingCoordinates,
}

/// Everything needed to show one device location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapLaunch {
    pub latitude: f64,
    pub longitude: f64,
    pub imei: Option<String>,
    /// Popup window title.
    pub title: String,
    /// Marker caption.
    pub label: String,
    /// Embedded place view; absent without an API key.
    pub embed_url: Option<String>,
    pub fallback_url: String,
    pub popup_features: &'static str,
}

impl MapLaunch {
    pub fn new(
        latitude: Option<f64>,
        longitude: Option<f64>,
        imei: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<Self, MapError> {
        let (latitude, longitude) = latitude
            .zip(longitude)
            .filter(|(lat, lng)| lat.is_finite() && lng.is_finite())
            .ok_or(MapError::MissingCoordinates)?;

        let imei = imei.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

        let embed_url = api_key.filter(|key| !key.is_empty()).map(|key| {
            format!(
                "{EMBED_BASE}?key={}&q={latitude},{longitude}&zoom={ZOOM}",
                urlencoding::encode(key)
            )
        });

        Ok(Self {
            title: format!(
                "Location: {}, {}",
                format_coordinate(Some(latitude)),
                format_coordinate(Some(longitude))
            ),
            label: format!(
                "Device Location (IMEI: {})",
                imei.as_deref().unwrap_or("Unknown")
            ),
            fallback_url: format!("{FALLBACK_BASE}?q={latitude},{longitude}&z={ZOOM}"),
            embed_url,
            latitude,
            longitude,
            imei,
            popup_features: POPUP_FEATURES,
        })
    }

    pub fn for_alert(alert: &Alert, api_key: Option<&str>) -> Result<Self, MapError> {
        Self::new(alert.latitude, alert.longitude, Some(&alert.imei), api_key)
    }

    /// Standalone HTML document for the popup window.
    pub fn popup_document(&self) -> Option<String> {
        let embed_url = self.embed_url.as_ref()?;

        Some(format!(
            r#"<!DOCTYPE html>
<html>
  <head>
    <title>{title}</title>
    <style>
      body, html {{ margin: 0; padding: 0; height: 100%; }}
      iframe {{ width: 100%; height: 100%; border: none; }}
      .caption {{ position: absolute; top: 8px; left: 8px; background: #fff; padding: 8px 10px; font-family: sans-serif; font-size: 13px; border-radius: 4px; }}
    </style>
  </head>
  <body>
    <div class="caption"><strong>{label}</strong><br>Coordinates: {lat}, {lng}</div>
    <iframe src="{src}" allowfullscreen></iframe>
  </body>
</html>
"#,
            title = escape_html(&self.title),
            label = escape_html(&self.label),
            lat = format_coordinate(Some(self.latitude)),
            lng = format_coordinate(Some(self.longitude)),
            src = escape_html(embed_url),
        ))
    }
}
