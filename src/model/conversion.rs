//! Conversion queue item model.
//!
//! A queue item is a deferred conversion: it becomes eligible at
//! `process_at` and is flagged `was_processed` once handled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of the ad that led to the conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdType {
    #[default]
    Undefined,
    AdNotification,
    NewTabPageAd,
    PromotedContentAd,
    InlineContentAd,
    SearchResultAd,
}

impl AdType {
    /// Canonical string form, as stored.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Undefined => "",
            Self::AdNotification => "ad_notification",
            Self::NewTabPageAd => "new_tab_page_ad",
            Self::PromotedContentAd => "promoted_content_ad",
            Self::InlineContentAd => "inline_content_ad",
            Self::SearchResultAd => "search_result_ad",
        }
    }

    /// Parse a stored value. Unknown values map to `Undefined`.
    #[must_use]
    pub fn from_str_lossy(value: &str) -> Self {
        match value {
            "ad_notification" => Self::AdNotification,
            "new_tab_page_ad" => Self::NewTabPageAd,
            "promoted_content_ad" => Self::PromotedContentAd,
            "inline_content_ad" => Self::InlineContentAd,
            "search_result_ad" => Self::SearchResultAd,
            _ => Self::Undefined,
        }
    }
}

/// How the user converted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionActionType {
    #[default]
    ViewThrough,
    ClickThrough,
}

impl ConversionActionType {
    /// Canonical string form, as stored in the `type` column.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ViewThrough => "view",
            Self::ClickThrough => "click",
        }
    }

    /// Parse a stored value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "view" => Some(Self::ViewThrough),
            "click" => Some(Self::ClickThrough),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConversionActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversion that the advertiser can verify with their public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiableConversion {
    pub id: String,
    pub advertiser_public_key_base64: String,
}

impl VerifiableConversion {
    /// Both fields must be present.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.advertiser_public_key_base64.is_empty()
    }
}

/// A deferred conversion waiting to be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionQueueItem {
    #[serde(default)]
    pub ad_type: AdType,
    #[serde(default)]
    pub campaign_id: String,
    pub creative_set_id: String,
    pub creative_instance_id: String,
    #[serde(default)]
    pub advertiser_id: String,
    #[serde(default)]
    pub segment: String,
    #[serde(default)]
    pub action_type: ConversionActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifiable: Option<VerifiableConversion>,
    #[serde(default)]
    pub process_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub was_processed: bool,
}

impl ConversionQueueItem {
    /// Create an unprocessed item for the given creative.
    #[must_use]
    pub fn new(creative_set_id: &str, creative_instance_id: &str) -> Self {
        Self {
            ad_type: AdType::Undefined,
            campaign_id: String::new(),
            creative_set_id: creative_set_id.to_string(),
            creative_instance_id: creative_instance_id.to_string(),
            advertiser_id: String::new(),
            segment: String::new(),
            action_type: ConversionActionType::ViewThrough,
            verifiable: None,
            process_at: None,
            was_processed: false,
        }
    }

    /// Whether the item satisfies the structural invariants for storage.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validation_failure().is_none()
    }

    /// First violated invariant, if any.
    #[must_use]
    pub fn validation_failure(&self) -> Option<&'static str> {
        if self.creative_set_id.is_empty() {
            return Some("missing creative_set_id");
        }
        if self.creative_instance_id.is_empty() {
            return Some("missing creative_instance_id");
        }
        if self.verifiable.as_ref().is_some_and(|v| !v.is_valid()) {
            return Some("incomplete verifiable conversion");
        }
        None
    }
}
