// YouTube API endpoint functions.
// Typed lookups for channel statistics and channel id resolution.

use crate::error::Result;

use super::client::YouTubeClient;
use super::types::{ChannelListResponse, ChannelStats, SearchListResponse};

/// How a user-supplied channel reference should be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef<'a> {
    /// A `/channel/<id>` URL; the id is already known.
    Id(&'a str),
    /// An `@handle`, searched by name.
    Handle(&'a str),
    /// Anything else, searched as free text.
    Query(&'a str),
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn leading_token(s: &str) -> &str {
    let end = s.find(|c| !is_id_char(c)).unwrap_or(s.len());
    &s[..end]
}

/// Classify a channel URL, handle or name without touching the network.
pub fn parse_channel_ref(input: &str) -> ChannelRef<'_> {
    let input = input.trim();

    if let Some((_, rest)) = input.split_once("channel/") {
        let id = leading_token(rest);
        if !id.is_empty() {
            return ChannelRef::Id(id);
        }
    }
    if let Some((_, rest)) = input.split_once('@') {
        let handle = leading_token(rest);
        if !handle.is_empty() {
            return ChannelRef::Handle(handle);
        }
    }
    ChannelRef::Query(input)
}

impl YouTubeClient {
    /// Get snippet and statistics for a channel. `None` if no channel has
    /// that id.
    pub async fn get_channel_stats(&self, channel_id: &str) -> Result<Option<ChannelStats>> {
        let params = [("part", "snippet,statistics"), ("id", channel_id)];
        let response = self.get_with_params("/channels", &params).await?;
        let wrapper: ChannelListResponse = response.json().await?;
        Ok(wrapper.items.into_iter().next().map(ChannelStats::from))
    }

    /// First channel id matching a search query.
    pub async fn search_channel(&self, query: &str) -> Result<Option<String>> {
        let params = [("part", "snippet"), ("type", "channel"), ("q", query)];
        let response = self.get_with_params("/search", &params).await?;
        let wrapper: SearchListResponse = response.json().await?;
        Ok(wrapper.items.into_iter().next().map(|i| i.snippet.channel_id))
    }

    /// Resolve a channel URL, `@handle` or name to a channel id.
    pub async fn resolve_channel_id(&self, url_or_name: &str) -> Result<Option<String>> {
        match parse_channel_ref(url_or_name) {
            ChannelRef::Id(id) => Ok(Some(id.to_string())),
            ChannelRef::Handle(handle) => match self.search_channel(handle).await? {
                Some(id) => Ok(Some(id)),
                None => self.search_channel(url_or_name.trim()).await,
            },
            ChannelRef::Query(query) if query.is_empty() => Ok(None),
            ChannelRef::Query(query) => self.search_channel(query).await,
        }
    }
}
