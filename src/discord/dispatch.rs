//! Posting classified events to their Discord channels.

use serenity::all::{ChannelId, CreateEmbed, CreateMessage, Http, Timestamp};
use tracing::{debug, error, info};

use crate::bridge::ChannelMap;
use crate::common::messages::ClassifiedEvent;
use crate::discord::resolver::MessageResolver;
use crate::game::formatter::{split_message, DISCORD_MESSAGE_LIMIT};

/// One Discord message worth of an event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPost {
    pub channel_id: u64,
    /// Mention pings; only set on the first chunk.
    pub content: Option<String>,
    /// Only set on the first chunk.
    pub title: Option<String>,
    pub description: String,
    pub colour: u32,
}

impl EventPost {
    fn to_message(&self) -> CreateMessage {
        let mut embed = CreateEmbed::new()
            .description(&self.description)
            .colour(self.colour)
            .timestamp(Timestamp::now());
        if let Some(title) = &self.title {
            embed = embed.title(title);
        }

        let mut message = CreateMessage::new().embed(embed);
        if let Some(content) = &self.content {
            message = message.content(content);
        }
        message
    }
}

/// Lay out `event` as posts for every mapped channel it routes to.
///
/// Categories without a channel are skipped. When two categories share a
/// channel the event is posted there once.
pub fn render_event(
    event: &ClassifiedEvent,
    channels: &ChannelMap,
    resolver: &MessageResolver,
) -> Vec<EventPost> {
    let description = resolver.escape_markdown(&event.body);
    let chunks = split_message(&description, DISCORD_MESSAGE_LIMIT);
    let pings = if event.mentions.is_empty() {
        None
    } else {
        Some(
            event
                .mentions
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(" "),
        )
    };

    let mut targets: Vec<u64> = Vec::new();
    for category in &event.categories {
        match channels.get(*category) {
            Some(channel_id) if !targets.contains(&channel_id) => targets.push(channel_id),
            Some(_) => {}
            None => debug!(category = %category, "No channel mapped, dropping"),
        }
    }

    let mut posts = Vec::with_capacity(targets.len() * chunks.len());
    for channel_id in targets {
        for (i, chunk) in chunks.iter().enumerate() {
            let first = i == 0;
            posts.push(EventPost {
                channel_id,
                content: pings.clone().filter(|_| first),
                title: Some(event.title.clone()).filter(|_| first),
                description: chunk.clone(),
                colour: event.color,
            });
        }
    }
    posts
}

/// Send rendered posts in order. A failed post is logged and the rest still go out.
pub async fn send_posts(http: &Http, posts: Vec<EventPost>) {
    for post in posts {
        let channel = ChannelId::new(post.channel_id);
        match channel.send_message(http, post.to_message()).await {
            Ok(_) => info!(channel = post.channel_id, "Archipelago -> Discord: {}", post.description),
            Err(e) => error!(channel = post.channel_id, "Failed to post event: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::messages::{ChannelCategory, Mention};
    use crate::config::types::ChannelsConfig;

    fn channels() -> ChannelMap {
        ChannelMap::new(ChannelsConfig {
            chat: Some(1),
            trade: Some(2),
            hint: None,
            log: Some(4),
        })
    }

    fn event(categories: Vec<ChannelCategory>, body: &str) -> ClassifiedEvent {
        ClassifiedEvent {
            categories,
            title: "Join Event".to_string(),
            body: body.to_string(),
            color: 0x3498db,
            mentions: vec![],
        }
    }

    #[test]
    fn test_posts_to_each_mapped_category() {
        let resolver = MessageResolver::new().unwrap();
        let mut ev = event(
            vec![ChannelCategory::Chat, ChannelCategory::Log],
            "Steve has joined the game",
        );
        ev.mentions = vec![Mention { discord_id: 42 }, Mention { discord_id: 7 }];

        let posts = render_event(&ev, &channels(), &resolver);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].channel_id, 1);
        assert_eq!(posts[1].channel_id, 4);
        for post in &posts {
            assert_eq!(post.content.as_deref(), Some("<@42> <@7>"));
            assert_eq!(post.title.as_deref(), Some("Join Event"));
            assert_eq!(post.description, "Steve has joined the game");
            assert_eq!(post.colour, 0x3498db);
        }
    }

    #[test]
    fn test_unmapped_category_dropped() {
        let resolver = MessageResolver::new().unwrap();
        let ev = event(vec![ChannelCategory::Hint], "hint text");
        assert!(render_event(&ev, &channels(), &resolver).is_empty());
    }

    #[test]
    fn test_shared_channel_posted_once() {
        let resolver = MessageResolver::new().unwrap();
        let map = ChannelMap::new(ChannelsConfig {
            chat: Some(9),
            trade: None,
            hint: None,
            log: Some(9),
        });
        let ev = event(vec![ChannelCategory::Chat, ChannelCategory::Log], "x");
        assert_eq!(render_event(&ev, &map, &resolver).len(), 1);
    }

    #[test]
    fn test_long_body_split_with_header_on_first_chunk() {
        let resolver = MessageResolver::new().unwrap();
        let body = "word ".repeat(900);
        let mut ev = event(vec![ChannelCategory::Chat], body.trim_end());
        ev.mentions = vec![Mention { discord_id: 42 }];

        let posts = render_event(&ev, &channels(), &resolver);
        assert_eq!(posts.len(), 3);
        assert!(posts.iter().all(|p| p.description.chars().count() <= DISCORD_MESSAGE_LIMIT));
        assert!(posts[0].title.is_some() && posts[0].content.is_some());
        assert!(posts[1..].iter().all(|p| p.title.is_none() && p.content.is_none()));
    }

    #[test]
    fn test_body_markdown_escaped() {
        let resolver = MessageResolver::new().unwrap();
        let ev = event(vec![ChannelCategory::Chat], "Link_2 sent *Sword*");
        let posts = render_event(&ev, &channels(), &resolver);
        assert_eq!(posts[0].description, "Link\\_2 sent \\*Sword\\*");
    }
}
