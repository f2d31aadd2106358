//! Remote entity interpolation for smooth rendering
//!
//! Remote snapshots arrive at the server's send rate, with jitter. Each entity
//! keeps a short, time-ordered buffer of them and is drawn a fixed delay
//! behind "now", so two samples usually bracket the render time and can be
//! blended. When they don't, the entity is extrapolated from its last two
//! samples, held, or hidden after prolonged silence.
//!
//! A second stage smooths each rendered value towards the sampled one every
//! frame, so an abrupt change in the underlying samples never shows up as a
//! jump on screen.

use crate::config::InterpolationConfig;
use crate::error::Result;
use indexmap::IndexMap;
use lagless_core::{approach, lerp_angle, DVec2, EntityId, Millis, SystemClock, TimeSource};
use log::debug;
use std::collections::VecDeque;

/// One buffered snapshot of a remote entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntitySample {
    pub position: DVec2,
    pub rotation: f64,
    pub health: f64,
    /// Local receive time
    pub timestamp: Millis,
}

/// Position, rotation, and health of a remote entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub position: DVec2,
    pub rotation: f64,
    pub health: f64,
}

/// How a sampled value was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// Blended between two samples bracketing the render time
    Interpolated,
    /// Projected forward from the velocity of the last two samples
    Extrapolated,
    /// Last known value, not enough samples to do better
    Held,
    /// Silent beyond the extrapolation window; hidden and frozen
    Frozen,
}

/// Raw value at the render time, before per-frame smoothing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub state: RenderState,
    pub kind: SampleKind,
}

impl Sample {
    /// Whether the entity should be drawn
    pub fn is_visible(&self) -> bool {
        self.kind != SampleKind::Frozen
    }
}

/// A remotely simulated entity as seen by this client
#[derive(Debug, Clone)]
pub struct RemoteEntity {
    id: EntityId,
    /// Oldest first, timestamps non-decreasing
    samples: VecDeque<EntitySample>,
    /// What was rendered last frame
    current: RenderState,
    /// Latest values received, unbuffered
    target: RenderState,
    last_update: Millis,
    visible: bool,
    moving: bool,
    /// Raw sample from the last `update()` or getter call
    sampled: Option<Sample>,
}

impl RemoteEntity {
    fn new(id: EntityId, state: RenderState, now: Millis) -> Self {
        Self {
            id,
            samples: VecDeque::new(),
            current: state,
            target: state,
            last_update: now,
            visible: true,
            moving: false,
            sampled: None,
        }
    }

    /// Server-assigned identifier
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Buffered samples, oldest first
    pub fn samples(&self) -> impl Iterator<Item = &EntitySample> {
        self.samples.iter()
    }

    /// Number of buffered samples
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Values rendered by the most recent getter calls
    pub fn current(&self) -> &RenderState {
        &self.current
    }

    /// Latest values received from the server
    pub fn target(&self) -> &RenderState {
        &self.target
    }

    /// When the last snapshot (or teleport) arrived
    pub fn last_update(&self) -> Millis {
        self.last_update
    }

    /// Whether the entity was drawable when last sampled
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether the last snapshot moved it past the moving threshold
    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// Raw sample computed most recently, before smoothing
    pub fn last_sample(&self) -> Option<&Sample> {
        self.sampled.as_ref()
    }

    fn resample(&mut self, now: Millis, config: &InterpolationConfig) -> Sample {
        let sample = self.sample_at(now, config);
        self.visible = sample.is_visible();
        self.sampled = Some(sample);
        sample
    }

    fn last_seen(&self) -> Millis {
        self.samples
            .back()
            .map_or(self.last_update, |s| s.timestamp)
    }

    fn push_sample(&mut self, sample: EntitySample, max_len: usize) {
        self.samples.push_back(sample);
        while self.samples.len() > max_len {
            self.samples.pop_front();
        }
    }

    /// Drop samples older than `cutoff`, always keeping the newest
    fn prune_before(&mut self, cutoff: Millis) -> usize {
        let mut pruned = 0;
        while self.samples.len() > 1 && self.samples.front().is_some_and(|s| s.timestamp < cutoff)
        {
            self.samples.pop_front();
            pruned += 1;
        }
        pruned
    }

    /// Value at `now - delay`
    fn sample_at(&self, now: Millis, config: &InterpolationConfig) -> Sample {
        let render_time = now - config.delay_ms;

        let bracket = self
            .samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .find(|(a, b)| a.timestamp <= render_time && render_time <= b.timestamp);
        if let Some((a, b)) = bracket {
            let span = b.timestamp - a.timestamp;
            let t = if span > 0.0 {
                ((render_time - a.timestamp) / span).clamp(0.0, 1.0)
            } else {
                1.0
            };
            return Sample {
                state: RenderState {
                    position: a.position.lerp(b.position, t),
                    rotation: lerp_angle(a.rotation, b.rotation, t),
                    // Health is discrete, take it from the newer sample
                    health: b.health,
                },
                kind: SampleKind::Interpolated,
            };
        }

        // Render time precedes the whole buffer (entity just appeared)
        let silent = now - self.last_seen() > config.extrapolation_window_ms;
        if let Some(first) = self.samples.front() {
            if render_time < first.timestamp && !silent {
                return Sample {
                    state: first.state(),
                    kind: SampleKind::Held,
                };
            }
        }

        self.extrapolate_or_use_last_position(now, render_time, config)
    }

    fn extrapolate_or_use_last_position(
        &self,
        now: Millis,
        render_time: Millis,
        config: &InterpolationConfig,
    ) -> Sample {
        if now - self.last_seen() > config.extrapolation_window_ms {
            return Sample {
                state: self.current,
                kind: SampleKind::Frozen,
            };
        }

        let mut newest = self.samples.iter().rev();
        match (newest.next(), newest.next()) {
            (Some(last), Some(prev)) if last.timestamp > prev.timestamp => {
                let velocity =
                    (last.position - prev.position) * (1.0 / (last.timestamp - prev.timestamp));
                let ahead = (render_time - last.timestamp).max(0.0);
                Sample {
                    state: RenderState {
                        position: last.position + velocity * ahead,
                        ..last.state()
                    },
                    kind: SampleKind::Extrapolated,
                }
            }
            (Some(last), _) => Sample {
                state: last.state(),
                kind: SampleKind::Held,
            },
            (None, _) => Sample {
                state: self.target,
                kind: SampleKind::Held,
            },
        }
    }
}

impl EntitySample {
    fn state(&self) -> RenderState {
        RenderState {
            position: self.position,
            rotation: self.rotation,
            health: self.health,
        }
    }
}

/// Buffers remote entity snapshots and produces smooth, delayed render values
///
/// The getters advance per-frame smoothing, so call each at most once per
/// entity per frame. `update()` must run every frame as well; all timeouts
/// are checked against the clock there.
pub struct RemoteEntityInterpolator<C: TimeSource = SystemClock> {
    config: InterpolationConfig,
    entities: IndexMap<EntityId, RemoteEntity>,
    clock: C,
}

impl<C: TimeSource> RemoteEntityInterpolator<C> {
    /// Create a new interpolator
    pub fn new(config: InterpolationConfig, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            entities: IndexMap::new(),
            clock,
        })
    }

    /// Record a snapshot for `id`, creating the entity on first sight
    ///
    /// Missing rotation or health keep their previous values (health starts
    /// at the configured default).
    pub fn update_entity(
        &mut self,
        id: EntityId,
        position: DVec2,
        rotation: Option<f64>,
        health: Option<f64>,
    ) {
        let now = self.clock.now_ms();
        let default_health = self.config.default_health;
        let entity = self.entities.entry(id).or_insert_with(|| {
            debug!("Tracking {}", id);
            let state = RenderState {
                position,
                rotation: rotation.unwrap_or(0.0),
                health: health.unwrap_or(default_health),
            };
            RemoteEntity::new(id, state, now)
        });

        entity.target = RenderState {
            position,
            rotation: rotation.unwrap_or(entity.target.rotation),
            health: health.unwrap_or(entity.target.health),
        };

        // Keep the buffer time-ordered even if the clock was nudged backwards
        let timestamp = entity
            .samples
            .back()
            .map_or(now, |last| now.max(last.timestamp));
        let sample = EntitySample {
            position,
            rotation: entity.target.rotation,
            health: entity.target.health,
            timestamp,
        };
        entity.push_sample(sample, self.config.max_buffer_size);

        entity.last_update = now;
        entity.visible = true;
        entity.moving = position.distance(entity.current.position) > self.config.moving_threshold;
    }

    /// Stop tracking `id`; returns whether it was tracked
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        let removed = self.entities.shift_remove(&id).is_some();
        if removed {
            debug!("Removed {}", id);
        }
        removed
    }

    /// Raw value at the render time, without per-frame smoothing
    pub fn sample(&self, id: EntityId) -> Option<Sample> {
        let now = self.clock.now_ms();
        self.entities
            .get(&id)
            .map(|entity| entity.sample_at(now, &self.config))
    }

    /// Sample `id` and update its visibility; `None` for unknown entities
    fn refresh(&mut self, id: EntityId) -> Option<(&mut RemoteEntity, Sample)> {
        let now = self.clock.now_ms();
        let entity = self.entities.get_mut(&id)?;
        let sample = entity.resample(now, &self.config);
        Some((entity, sample))
    }

    /// Position to draw `id` at this frame
    ///
    /// Hidden entities stay frozen where they were last drawn.
    pub fn interpolated_position(&mut self, id: EntityId) -> Option<DVec2> {
        let factor = self.config.position_smoothing;
        let (entity, sample) = self.refresh(id)?;
        if sample.is_visible() {
            let current = &mut entity.current.position;
            *current += (sample.state.position - *current) * factor;
        }
        Some(entity.current.position)
    }

    /// Rotation to draw `id` with this frame, blended along the shortest arc
    pub fn interpolated_rotation(&mut self, id: EntityId) -> Option<f64> {
        let factor = self.config.rotation_smoothing;
        let (entity, sample) = self.refresh(id)?;
        if sample.is_visible() {
            entity.current.rotation =
                lerp_angle(entity.current.rotation, sample.state.rotation, factor);
        }
        Some(entity.current.rotation)
    }

    /// Health to display for `id` this frame
    ///
    /// Eases towards the sampled value and lands on it exactly once close.
    pub fn interpolated_health(&mut self, id: EntityId) -> Option<f64> {
        let factor = self.config.health_smoothing;
        let snap = self.config.health_snap_threshold;
        let (entity, sample) = self.refresh(id)?;
        if sample.is_visible() {
            let target = sample.state.health;
            let next = approach(entity.current.health, target, factor);
            entity.current.health = if (target - next).abs() < snap {
                target
            } else {
                next
            };
        }
        Some(entity.current.health)
    }

    /// Per-frame maintenance
    ///
    /// Evicts entities silent past the timeout, prunes old samples, and
    /// re-samples the rest, hiding those silent past the extrapolation window.
    pub fn update(&mut self) {
        let now = self.clock.now_ms();
        let timeout = self.config.entity_timeout_ms;
        let before = self.entities.len();
        self.entities.retain(|id, entity| {
            let alive = now - entity.last_update <= timeout;
            if !alive {
                debug!("Evicting {}: silent for {}ms", id, now - entity.last_update);
            }
            alive
        });
        let evicted = before - self.entities.len();
        if evicted > 0 {
            debug!("Evicted {} stale entities", evicted);
        }

        let cutoff = now - self.config.sample_max_age_ms;
        for entity in self.entities.values_mut() {
            entity.prune_before(cutoff);
            entity.resample(now, &self.config);
        }
    }

    /// Replace the configuration
    ///
    /// Buffered samples are left as they are; a smaller buffer size takes
    /// effect on each entity's next snapshot.
    pub fn configure(&mut self, config: InterpolationConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Move `id` to `position` immediately, bypassing interpolation
    ///
    /// Creates the entity if needed and empties its buffer.
    pub fn force_teleport(&mut self, id: EntityId, position: DVec2) {
        let now = self.clock.now_ms();
        let default_health = self.config.default_health;
        let entity = self.entities.entry(id).or_insert_with(|| {
            let state = RenderState {
                position,
                rotation: 0.0,
                health: default_health,
            };
            RemoteEntity::new(id, state, now)
        });

        entity.samples.clear();
        entity.sampled = None;
        entity.current.position = position;
        entity.target.position = position;
        entity.last_update = now;
        entity.visible = true;
        entity.moving = false;
        debug!("Teleported {} to ({}, {})", id, position.x, position.y);
    }

    /// Stop tracking every entity
    pub fn clear(&mut self) {
        self.entities.clear();
    }

    /// Get a tracked entity
    pub fn entity(&self, id: EntityId) -> Option<&RemoteEntity> {
        self.entities.get(&id)
    }

    /// Tracked entities in the order they were first seen
    pub fn entities(&self) -> impl Iterator<Item = &RemoteEntity> {
        self.entities.values()
    }

    /// Identifiers of tracked entities in the order they were first seen
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Whether `id` is tracked and should be drawn
    pub fn is_visible(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(|e| e.visible)
    }

    /// Whether `id` is tracked and its last snapshot moved it
    pub fn is_moving(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(|e| e.moving)
    }

    /// Number of tracked entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether no entity is tracked
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Current configuration
    pub fn config(&self) -> &InterpolationConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lagless_core::ManualClock;

    const ID: EntityId = EntityId(1);

    fn interpolator(clock: &ManualClock) -> RemoteEntityInterpolator<ManualClock> {
        RemoteEntityInterpolator::new(InterpolationConfig::default(), clock.clone()).unwrap()
    }

    fn at(x: f64) -> DVec2 {
        DVec2::new(x, 0.0)
    }

    #[test]
    fn test_bracket_interpolation() {
        let clock = ManualClock::new();
        let mut interp = interpolator(&clock);

        interp.update_entity(ID, at(0.0), None, None);
        clock.advance(100.0);
        interp.update_entity(ID, at(100.0), None, None);
        clock.advance(50.0);

        let sample = interp.sample(ID).unwrap();
        assert_eq!(sample.kind, SampleKind::Interpolated);
        assert!((sample.state.position.x - 50.0).abs() < 1e-9);

        // Smoothing approaches the sampled value without jumping to it
        let first = interp.interpolated_position(ID).unwrap().x;
        assert!(first > 0.0 && first < 50.0);
        let mut x = first;
        for _ in 0..100 {
            x = interp.interpolated_position(ID).unwrap().x;
        }
        assert!((x - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_single_sample_hold_then_hide() {
        let clock = ManualClock::new();
        let mut interp = interpolator(&clock);

        interp.update_entity(ID, at(10.0), None, None);
        clock.advance(150.0);
        assert_eq!(interp.sample(ID).map(|s| s.kind), Some(SampleKind::Held));
        assert_eq!(interp.interpolated_position(ID), Some(at(10.0)));
        assert!(interp.is_visible(ID));

        clock.advance(100.0);
        let sample = interp.sample(ID).unwrap();
        assert_eq!(sample.kind, SampleKind::Frozen);
        assert_eq!(interp.interpolated_position(ID), Some(at(10.0)));
        assert!(!interp.is_visible(ID));

        // A fresh snapshot brings it back
        interp.update_entity(ID, at(12.0), None, None);
        assert!(interp.is_visible(ID));
    }

    #[test]
    fn test_holds_oldest_before_buffer() {
        let clock = ManualClock::new();
        let mut interp = interpolator(&clock);

        clock.set(1000.0);
        interp.update_entity(ID, at(0.0), Some(0.5), None);
        clock.advance(20.0);
        interp.update_entity(ID, at(10.0), Some(1.0), None);
        clock.advance(20.0);

        // Render time 940 precedes both samples
        let sample = interp.sample(ID).unwrap();
        assert_eq!(sample.kind, SampleKind::Held);
        assert_eq!(sample.state.position, at(0.0));
        assert_eq!(sample.state.rotation, 0.5);
        assert!(sample.is_visible());
    }

    #[test]
    fn test_extrapolates_from_last_two() {
        let clock = ManualClock::new();
        let mut interp = interpolator(&clock);

        interp.update_entity(ID, at(0.0), None, None);
        clock.advance(100.0);
        interp.update_entity(ID, at(10.0), None, None);
        clock.advance(150.0);

        // Render time 150 is 50ms past the newest sample at 0.1 units/ms
        let sample = interp.sample(ID).unwrap();
        assert_eq!(sample.kind, SampleKind::Extrapolated);
        assert!((sample.state.position.x - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_update_hides_silent_entities() {
        let clock = ManualClock::new();
        let mut interp = interpolator(&clock);

        interp.update_entity(ID, at(0.0), None, None);
        clock.advance(201.0);
        interp.update();
        assert!(!interp.is_visible(ID));
        assert_eq!(interp.len(), 1);
        let cached = interp.entity(ID).and_then(|e| e.last_sample().copied());
        assert_eq!(cached.map(|s| s.kind), Some(SampleKind::Frozen));
    }

    #[test]
    fn test_buffer_capacity() {
        let clock = ManualClock::new();
        let mut interp = interpolator(&clock);
        let max = interp.config().max_buffer_size;

        for i in 0..=max {
            clock.advance(10.0);
            interp.update_entity(ID, at(i as f64), None, None);
        }

        let xs: Vec<_> = interp
            .entity(ID)
            .unwrap()
            .samples()
            .map(|s| s.position.x)
            .collect();
        assert_eq!(xs.len(), max);
        assert_eq!(xs.first(), Some(&1.0));
        assert!(xs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_force_teleport_idempotent() {
        let clock = ManualClock::new();
        let mut interp = interpolator(&clock);
        for i in 0..4 {
            clock.advance(50.0);
            interp.update_entity(ID, at(i as f64), Some(1.0), Some(80.0));
        }

        interp.force_teleport(ID, DVec2::new(500.0, 500.0));
        let first = interp.entity(ID).cloned().unwrap();
        interp.force_teleport(ID, DVec2::new(500.0, 500.0));
        let second = interp.entity(ID).unwrap();

        assert_eq!(second.sample_count(), 0);
        assert_eq!(first.sample_count(), 0);
        assert_eq!(second.current(), first.current());
        assert_eq!(second.target(), first.target());
        assert_eq!(second.current().position, DVec2::new(500.0, 500.0));
        assert_eq!(
            interp.interpolated_position(ID),
            Some(DVec2::new(500.0, 500.0))
        );
    }

    #[test]
    fn test_force_teleport_creates_entity() {
        let clock = ManualClock::new();
        let mut interp = interpolator(&clock);
        interp.force_teleport(EntityId::new(9), at(3.0));
        assert!(interp.is_visible(EntityId::new(9)));
        assert_eq!(interp.entity(EntityId::new(9)).map(|e| e.target().health), Some(100.0));
    }

    #[test]
    fn test_rotation_takes_short_path() {
        let clock = ManualClock::new();
        let mut interp = interpolator(&clock);

        interp.update_entity(ID, at(0.0), Some(3.0), None);
        clock.advance(100.0);
        interp.update_entity(ID, at(0.0), Some(-3.0), None);
        clock.advance(50.0);

        // Halfway across the seam is near +/-PI, never near 0
        let sampled = interp.sample(ID).unwrap().state.rotation;
        assert!(sampled.abs() > 3.0);

        let rendered = interp.interpolated_rotation(ID).unwrap();
        assert!(rendered > 3.0);
    }

    #[test]
    fn test_health_from_newer_sample_and_snaps() {
        let clock = ManualClock::new();
        let mut interp = interpolator(&clock);

        interp.update_entity(ID, at(0.0), None, None);
        clock.advance(100.0);
        interp.update_entity(ID, at(0.0), None, Some(50.0));
        clock.advance(50.0);

        assert_eq!(interp.sample(ID).map(|s| s.state.health), Some(50.0));

        let first = interp.interpolated_health(ID).unwrap();
        assert!((first - 90.0).abs() < 1e-9);
        let mut health = first;
        for _ in 0..40 {
            health = interp.interpolated_health(ID).unwrap();
        }
        assert_eq!(health, 50.0);
    }

    #[test]
    fn test_update_prunes_and_evicts() {
        let clock = ManualClock::new();
        let mut interp = interpolator(&clock);

        interp.update_entity(ID, at(0.0), None, None);
        clock.advance(100.0);
        interp.update_entity(ID, at(1.0), None, None);

        clock.set(1200.0);
        interp.update();
        assert_eq!(interp.entity(ID).map(|e| e.sample_count()), Some(1));

        clock.set(5100.0);
        interp.update();
        assert_eq!(interp.len(), 1);

        clock.set(5101.0);
        interp.update();
        assert!(interp.is_empty());
    }

    #[test]
    fn test_remove_entity_idempotent() {
        let clock = ManualClock::new();
        let mut interp = interpolator(&clock);
        interp.update_entity(ID, at(0.0), None, None);

        assert!(interp.remove_entity(ID));
        assert!(!interp.remove_entity(ID));
        assert!(interp.interpolated_position(ID).is_none());
        assert!(interp.sample(ID).is_none());
    }

    #[test]
    fn test_moving_flag() {
        let clock = ManualClock::new();
        let mut interp = interpolator(&clock);

        interp.update_entity(ID, at(0.0), None, None);
        assert!(!interp.is_moving(ID));
        clock.advance(50.0);
        interp.update_entity(ID, at(10.0), None, None);
        assert!(interp.is_moving(ID));
    }

    #[test]
    fn test_entities_in_join_order() {
        let clock = ManualClock::new();
        let mut interp = interpolator(&clock);
        for id in [5, 2, 9] {
            interp.update_entity(EntityId::new(id), at(0.0), None, None);
        }
        interp.remove_entity(EntityId::new(2));

        let ids: Vec<_> = interp.entity_ids().map(|id| id.raw()).collect();
        assert_eq!(ids, vec![5, 9]);
    }

    #[test]
    fn test_configure_rejects_invalid() {
        let clock = ManualClock::new();
        let mut interp = interpolator(&clock);
        let bad = InterpolationConfig {
            extrapolation_window_ms: 0.0,
            ..Default::default()
        };
        assert!(interp.configure(bad).is_err());
        assert_eq!(interp.config().extrapolation_window_ms, 200.0);
    }
}
