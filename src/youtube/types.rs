// YouTube Data API response types.
// Defines structs for deserializing channel and search responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope of `channels.list`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelListResponse {
    #[serde(default)]
    pub items: Vec<ChannelItem>,
}

/// One channel resource.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelItem {
    pub id: String,
    pub snippet: ChannelSnippet,
    pub statistics: ChannelStatistics,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnails {
    pub default: Option<Thumbnail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}

/// Channel counters. The API sends them as decimal strings and omits the
/// subscriber count when the channel hides it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatistics {
    pub subscriber_count: Option<String>,
    #[serde(default)]
    pub hidden_subscriber_count: bool,
    pub view_count: Option<String>,
    pub video_count: Option<String>,
}

/// Envelope of `search.list`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchListResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchItem {
    pub snippet: SearchSnippet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSnippet {
    pub channel_id: String,
    #[serde(default)]
    pub title: String,
}

/// Channel statistics as the dashboard caches them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub id: String,
    pub name: String,
    pub subscribers: Option<u64>,
    pub views: u64,
    pub videos_count: u64,
    pub profile_image: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

fn parse_count(count: Option<&str>) -> Option<u64> {
    count.and_then(|c| c.trim().parse().ok())
}

impl From<ChannelItem> for ChannelStats {
    fn from(item: ChannelItem) -> Self {
        let stats = item.statistics;
        Self {
            id: item.id,
            name: item.snippet.title,
            subscribers: if stats.hidden_subscriber_count {
                None
            } else {
                parse_count(stats.subscriber_count.as_deref())
            },
            views: parse_count(stats.view_count.as_deref()).unwrap_or(0),
            videos_count: parse_count(stats.video_count.as_deref()).unwrap_or(0),
            profile_image: item.snippet.thumbnails.default.map(|t| t.url),
            published_at: item.snippet.published_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANNEL_RESPONSE: &str = r#"{
        "kind": "youtube#channelListResponse",
        "items": [{
            "id": "UCabc123",
            "snippet": {
                "title": "Cat Videos",
                "description": "cats",
                "publishedAt": "2015-03-02T10:00:00Z",
                "thumbnails": {"default": {"url": "https://yt3.example/cat.jpg"}}
            },
            "statistics": {
                "viewCount": "1000",
                "subscriberCount": "250",
                "hiddenSubscriberCount": false,
                "videoCount": "12"
            }
        }]
    }"#;

    #[test]
    fn test_channel_stats_from_response() {
        let response: ChannelListResponse = serde_json::from_str(CHANNEL_RESPONSE).unwrap();
        let item = response.items.into_iter().next().unwrap();
        let stats = ChannelStats::from(item);

        assert_eq!(stats.id, "UCabc123");
        assert_eq!(stats.name, "Cat Videos");
        assert_eq!(stats.subscribers, Some(250));
        assert_eq!(stats.views, 1000);
        assert_eq!(stats.videos_count, 12);
        assert_eq!(
            stats.profile_image.as_deref(),
            Some("https://yt3.example/cat.jpg")
        );
        assert!(stats.published_at.is_some());
    }

    #[test]
    fn test_hidden_subscribers_and_missing_counts() {
        let raw = r#"{
            "id": "UChidden",
            "snippet": {"title": "Hidden"},
            "statistics": {"hiddenSubscriberCount": true, "subscriberCount": "0"}
        }"#;
        let stats = ChannelStats::from(serde_json::from_str::<ChannelItem>(raw).unwrap());

        assert_eq!(stats.subscribers, None);
        assert_eq!(stats.views, 0);
        assert_eq!(stats.profile_image, None);
    }

    #[test]
    fn test_empty_list_response() {
        let response: ChannelListResponse =
            serde_json::from_str(r#"{"kind": "youtube#channelListResponse"}"#).unwrap();
        assert!(response.items.is_empty());
    }
}
