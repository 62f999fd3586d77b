use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::audience::{Audience, Recipient, RecipientSource};
use crate::format::Arg;
use crate::localizer::Localizer;
use crate::metrics::BroadcastMetrics;
use crate::template::{Template, TemplateId, TemplateRegistry};

/// Result of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastResult {
    /// Template key, empty when the template was unknown
    pub template: String,
    /// Language (and team) groups the audience split into
    pub buckets: usize,
    /// Render passes; equals `buckets`
    pub renders: usize,
    /// Recipients selected
    pub recipients: usize,
    /// Recipients the sink confirmed
    pub delivered: usize,
    /// Recipients the sink did not confirm
    pub failed: usize,
}

impl BroadcastResult {
    fn unknown() -> Self {
        Self::default()
    }

    pub fn success(&self) -> bool {
        self.delivered > 0
    }
}

/// Statistics for the broadcaster
#[derive(Debug, Default)]
pub struct BroadcastStats {
    /// Broadcasts started, including direct messages
    pub total_broadcasts: AtomicU64,
    /// Render passes performed
    pub total_renders: AtomicU64,
    /// Recipients reached by the sink
    pub total_delivered: AtomicU64,
    /// Recipients the sink rejected
    pub total_failed: AtomicU64,
    /// Single-recipient sends
    pub direct_messages: AtomicU64,
    /// Broadcasts naming a template that is not registered
    pub unknown_templates: AtomicU64,
}

impl BroadcastStats {
    pub fn snapshot(&self) -> BroadcastStatsSnapshot {
        BroadcastStatsSnapshot {
            total_broadcasts: self.total_broadcasts.load(Ordering::Relaxed),
            total_renders: self.total_renders.load(Ordering::Relaxed),
            total_delivered: self.total_delivered.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            direct_messages: self.direct_messages.load(Ordering::Relaxed),
            unknown_templates: self.unknown_templates.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of broadcaster statistics
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastStatsSnapshot {
    pub total_broadcasts: u64,
    pub total_renders: u64,
    pub total_delivered: u64,
    pub total_failed: u64,
    pub direct_messages: u64,
    pub unknown_templates: u64,
}

/// Renders templates once per language group and hands them to the sink
pub struct Broadcaster {
    localizer: Arc<Localizer>,
    sink: Arc<dyn super::MessageSink>,
    stats: BroadcastStats,
}

impl Broadcaster {
    pub fn new(localizer: Arc<Localizer>, sink: Arc<dyn super::MessageSink>) -> Self {
        Self {
            localizer,
            sink,
            stats: BroadcastStats::default(),
        }
    }

    pub fn localizer(&self) -> &Arc<Localizer> {
        &self.localizer
    }

    pub fn stats(&self) -> &BroadcastStats {
        &self.stats
    }

    /// Send `template` to everyone `audience` selects from `source`
    #[tracing::instrument(
        name = "broadcast.audience",
        skip(self, source, args),
        fields(template = %id, audience = audience.kind())
    )]
    pub fn broadcast<S: RecipientSource>(
        &self,
        source: &S,
        audience: &Audience,
        id: TemplateId,
        args: &[Arg],
    ) -> BroadcastResult {
        let registry = self.localizer.templates();
        let Some(template) = registry.by_id(id) else {
            return self.unknown_template(&id.to_string());
        };
        let recipients = source.select(audience);
        let result = self.dispatch(&registry, template, recipients, args);
        BroadcastMetrics::record_broadcast(audience.kind(), result.buckets, result.recipients);
        result
    }

    /// Same as [`Broadcaster::broadcast`], addressing the template by key
    #[tracing::instrument(
        name = "broadcast.audience_key",
        skip(self, source, args),
        fields(audience = audience.kind())
    )]
    pub fn broadcast_key<S: RecipientSource>(
        &self,
        source: &S,
        audience: &Audience,
        key: &str,
        args: &[Arg],
    ) -> BroadcastResult {
        let registry = self.localizer.templates();
        let Some(template) = registry.by_key(key) else {
            return self.unknown_template(key);
        };
        let recipients = source.select(audience);
        let result = self.dispatch(&registry, template, recipients, args);
        BroadcastMetrics::record_broadcast(audience.kind(), result.buckets, result.recipients);
        result
    }

    /// Send to an explicit recipient list, skipping audience selection
    #[tracing::instrument(name = "broadcast.recipients", skip(self, recipients, args), fields(template = %id))]
    pub fn broadcast_to<I, R>(&self, recipients: I, id: TemplateId, args: &[Arg]) -> BroadcastResult
    where
        I: IntoIterator<Item = R>,
        R: Recipient,
    {
        let registry = self.localizer.templates();
        let Some(template) = registry.by_id(id) else {
            return self.unknown_template(&id.to_string());
        };
        let result = self.dispatch(&registry, template, recipients, args);
        BroadcastMetrics::record_broadcast("recipients", result.buckets, result.recipients);
        result
    }

    /// Send to a single recipient
    #[tracing::instrument(name = "broadcast.direct", skip(self, recipient, args), fields(template = %id, recipient = %recipient.id()))]
    pub fn send_to<R: Recipient>(&self, recipient: &R, id: TemplateId, args: &[Arg]) -> BroadcastResult {
        self.stats.direct_messages.fetch_add(1, Ordering::Relaxed);
        let registry = self.localizer.templates();
        let Some(template) = registry.by_id(id) else {
            return self.unknown_template(&id.to_string());
        };
        let result = self.dispatch(&registry, template, std::iter::once(recipient), args);
        BroadcastMetrics::record_broadcast("direct", result.buckets, result.recipients);
        result
    }

    fn dispatch<I, R>(
        &self,
        registry: &TemplateRegistry,
        template: &Template,
        recipients: I,
        args: &[Arg],
    ) -> BroadcastResult
    where
        I: IntoIterator<Item = R>,
        R: Recipient,
    {
        self.stats.total_broadcasts.fetch_add(1, Ordering::Relaxed);

        let grouping = self.localizer.group(template, recipients);
        let mut result = BroadcastResult {
            template: template.key.clone(),
            buckets: grouping.len(),
            recipients: grouping.total_recipients(),
            ..BroadcastResult::default()
        };

        for bucket in grouping.iter() {
            let text = self.localizer.render_bucket(registry, template, bucket, args);
            result.renders += 1;

            let delivered = self.sink.deliver(&bucket.recipients, &text).min(bucket.recipients.len());
            result.delivered += delivered;
            result.failed += bucket.recipients.len() - delivered;
        }
        drop(grouping);

        self.stats
            .total_renders
            .fetch_add(result.renders as u64, Ordering::Relaxed);
        self.stats
            .total_delivered
            .fetch_add(result.delivered as u64, Ordering::Relaxed);
        self.stats
            .total_failed
            .fetch_add(result.failed as u64, Ordering::Relaxed);
        BroadcastMetrics::record_delivered(result.delivered);
        if result.failed > 0 {
            BroadcastMetrics::record_failed(result.failed);
            tracing::warn!(
                template = %template.key,
                failed = result.failed,
                "Sink did not deliver to every recipient"
            );
        }

        tracing::debug!(
            template = %template.key,
            buckets = result.buckets,
            recipients = result.recipients,
            delivered = result.delivered,
            "Broadcast complete"
        );
        result
    }

    fn unknown_template(&self, reference: &str) -> BroadcastResult {
        self.stats.unknown_templates.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(template = reference, "Broadcast for unknown template dropped");
        BroadcastResult::unknown()
    }
}
