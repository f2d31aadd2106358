//! Latency Simulation
//!
//! Runs a client session against a simulated authoritative server with
//! configurable latency and jitter, then reports how prediction and
//! interpolation coped.
//! - The local actor steers along a curve; the server moves it slightly
//!   faster than the client predicts, so reconciliation has work to do
//! - Remote entities orbit fixed points and lose health over time
//! - An optional teleport exercises hard corrections
//!
//! Set `RUST_LOG=lagless_netcode=debug` for per-correction logging.

use clap::Parser;
use lagless_core::{
    EntityId, LocalMovementState, ManualClock, Millis, MovePayload, MovementInput, TimeSource,
};
use lagless_netcode::{
    ClientSession, EntitySnapshot, MoveSender, NetcodeConfig, PositionCorrection,
    QualityHint, ServerConfirmation, ServerMessage,
};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::f64::consts::{FRAC_PI_2, TAU};
use std::path::PathBuf;

/// Frame length of the simulated render loop
const FRAME_MS: Millis = 16.0;
/// Remote snapshot interval (20Hz)
const SNAPSHOT_INTERVAL_MS: Millis = 50.0;
/// Frames between connection quality reports
const QUALITY_REPORT_FRAMES: u32 = 60;

#[derive(Parser, Debug)]
#[command(name = "latency_sim", about = "Client-side latency hiding simulation", version)]
struct Args {
    /// RON session config (defaults apply when omitted)
    #[arg(long, env = "LATENCY_SIM_CONFIG")]
    config: Option<PathBuf>,

    /// Frames to simulate
    #[arg(long, default_value_t = 600)]
    frames: u32,

    /// One-way latency in milliseconds
    #[arg(long, default_value_t = 60.0)]
    latency_ms: f64,

    /// Maximum extra delay per message in milliseconds
    #[arg(long, default_value_t = 15.0)]
    jitter_ms: f64,

    /// Server movement speed relative to the client's prediction
    #[arg(long, default_value_t = 1.1)]
    server_speed_scale: f64,

    /// Number of remote entities
    #[arg(long, default_value_t = 3)]
    remotes: u64,

    /// Frame at which the server teleports the local actor
    #[arg(long)]
    teleport_at: Option<u32>,

    /// Seed for the jitter sequence
    #[arg(long, default_value_t = 7)]
    seed: u64,
}

/// Deterministic xorshift64 jitter source
struct Jitter {
    state: u64,
}

impl Jitter {
    fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Uniform value in [0, max)
    fn next(&mut self, max: f64) -> f64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x as f64 / (u64::MAX as f64 + 1.0)) * max
    }
}

/// One direction of a lagged, ordered link
struct Link<T> {
    in_flight: VecDeque<(Millis, T)>,
    latency_ms: f64,
    jitter_ms: f64,
    jitter: Jitter,
}

impl<T> Link<T> {
    fn new(latency_ms: f64, jitter_ms: f64, seed: u64) -> Self {
        Self {
            in_flight: VecDeque::new(),
            latency_ms,
            jitter_ms,
            jitter: Jitter::new(seed),
        }
    }

    /// Queue `item`; delivery order matches send order
    fn send(&mut self, now: Millis, item: T) {
        let mut deliver_at = now + self.latency_ms + self.jitter.next(self.jitter_ms);
        if let Some((last, _)) = self.in_flight.back() {
            deliver_at = deliver_at.max(*last);
        }
        self.in_flight.push_back((deliver_at, item));
    }

    /// Everything due by `now`
    fn arrived(&mut self, now: Millis) -> Vec<T> {
        let mut out = Vec::new();
        while self.in_flight.front().is_some_and(|(at, _)| *at <= now) {
            if let Some((_, item)) = self.in_flight.pop_front() {
                out.push(item);
            }
        }
        out
    }
}

/// Client-to-server move messages
struct Uplink {
    link: Link<MovePayload>,
    clock: ManualClock,
}

impl MoveSender for Uplink {
    type Error = Infallible;

    fn send(&mut self, payload: &MovePayload) -> Result<(), Infallible> {
        self.link.send(self.clock.now_ms(), *payload);
        Ok(())
    }
}

/// A remote entity orbiting a fixed point
struct Orbiter {
    id: EntityId,
    center: (f64, f64),
    radius: f64,
    angular_speed: f64,
    phase: f64,
}

impl Orbiter {
    fn snapshot(&self, now: Millis) -> EntitySnapshot {
        let angle = self.phase + self.angular_speed * now / 1000.0;
        EntitySnapshot {
            id: self.id,
            x: self.center.0 + self.radius * angle.cos(),
            y: self.center.1 + self.radius * angle.sin(),
            rotation: Some((angle + FRAC_PI_2).rem_euclid(TAU)),
            health: Some((100.0 - now / 250.0).max(20.0)),
        }
    }
}

/// Authoritative simulation of the local actor and the remote entities
struct Server {
    position: (f64, f64),
    step: f64,
    remotes: Vec<Orbiter>,
    last_snapshot: Option<Millis>,
}

impl Server {
    fn new(step: f64, remotes: u64) -> Self {
        let remotes = (0..remotes)
            .map(|i| Orbiter {
                id: EntityId::new(i + 1),
                center: (150.0 * i as f64, 100.0),
                radius: 40.0 + 10.0 * i as f64,
                angular_speed: 1.5 - 0.3 * i as f64,
                phase: i as f64,
            })
            .collect();
        Self {
            position: (0.0, 0.0),
            step,
            remotes,
            last_snapshot: None,
        }
    }

    /// Apply a move and produce the confirmation for it
    fn apply(&mut self, payload: &MovePayload, now: Millis) -> ServerMessage {
        let direction = payload.input.direction();
        self.position.0 += direction.x * self.step;
        self.position.1 += direction.y * self.step;
        ServerMessage::Confirmation(ServerConfirmation {
            x: self.position.0,
            y: self.position.1,
            chunk_x: 0,
            chunk_y: 0,
            sequence: Some(payload.sequence),
            timestamp: now,
        })
    }

    fn teleport(&mut self, x: f64, y: f64) -> ServerMessage {
        self.position = (x, y);
        ServerMessage::PositionCorrection(PositionCorrection {
            x,
            y,
            chunk_x: 0,
            chunk_y: 0,
            reason: "simulated desync".to_string(),
        })
    }

    /// Remote snapshots, if one is due
    fn snapshots(&mut self, now: Millis) -> Vec<ServerMessage> {
        if self
            .last_snapshot
            .is_some_and(|last| now - last < SNAPSHOT_INTERVAL_MS)
        {
            return Vec::new();
        }
        self.last_snapshot = Some(now);
        self.remotes
            .iter()
            .map(|remote| {
                let snapshot = remote.snapshot(now);
                if now == 0.0 {
                    ServerMessage::EntityJoin(snapshot)
                } else {
                    ServerMessage::EntityUpdate(snapshot)
                }
            })
            .collect()
    }
}

/// Steering for the local actor: a slow S-curve
fn steering(frame: u32) -> MovementInput {
    let angle = (frame as f64 * 0.01).sin();
    MovementInput::new(angle.cos(), angle.sin())
}

fn load_config(path: Option<&PathBuf>) -> Result<NetcodeConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(NetcodeConfig::load(path)?),
        None => Ok(NetcodeConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lagless_netcode=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    log::info!(
        "Simulating {} frames (latency={}ms, jitter={}ms, remotes={})",
        args.frames,
        args.latency_ms,
        args.jitter_ms,
        args.remotes,
    );

    let clock = ManualClock::new();
    let step = config.prediction.step_distance() * args.server_speed_scale;
    let mut session = ClientSession::new(config, clock.clone())?;
    session.initialize(LocalMovementState::new(0.0, 0.0, 0, 0));
    let inbox = session.inbox_sender();

    let mut server = Server::new(step, args.remotes);
    let mut uplink = Uplink {
        link: Link::new(args.latency_ms, args.jitter_ms, args.seed),
        clock: clock.clone(),
    };
    let mut downlink: Link<ServerMessage> =
        Link::new(args.latency_ms, args.jitter_ms, args.seed.wrapping_add(1));

    let mut rejected = 0;
    let mut largest_render_jump: f64 = 0.0;
    let mut previous_render = session.current_state().position();
    let mut hidden_frames = 0;

    for frame in 0..args.frames {
        let now = clock.now_ms();

        // Player input, predicted at once and sent upstream
        session.process_input(steering(frame), &mut uplink)?;

        // Server side of the wire
        for payload in uplink.link.arrived(now) {
            let confirmation = server.apply(&payload, now);
            downlink.send(now, confirmation);
        }
        if args.teleport_at == Some(frame) {
            let (x, y) = server.position;
            let correction = server.teleport(x + 50.0, y - 50.0);
            downlink.send(now, correction);
        }
        for snapshot in server.snapshots(now) {
            downlink.send(now, snapshot);
        }
        if frame % QUALITY_REPORT_FRAMES == 0 {
            let hint = ServerMessage::QualityHint(QualityHint {
                rtt_ms: 2.0 * args.latency_ms,
                jitter_ms: args.jitter_ms,
            });
            downlink.send(now, hint);
        }

        // Client side: deliver, then run the frame
        for message in downlink.arrived(now) {
            inbox.post(message)?;
        }
        rejected += session.tick().rejected;

        let render = session.current_state().position();
        largest_render_jump = largest_render_jump.max(render.distance(previous_render));
        previous_render = render;

        let ids: Vec<_> = session.interpolator().entity_ids().collect();
        let interpolator = session.interpolator_mut();
        for id in ids {
            interpolator.interpolated_position(id);
            interpolator.interpolated_rotation(id);
            interpolator.interpolated_health(id);
            if !interpolator.is_visible(id) {
                hidden_frames += 1;
            }
        }

        clock.advance(FRAME_MS);
    }

    let stats = session.prediction().stats();
    let snapshots = session.prediction().history().stats();
    let render = session.current_state();
    let (server_x, server_y) = server.position;

    println!("== latency_sim ==");
    println!(
        "quality tier:        {}",
        session
            .quality()
            .current()
            .map_or_else(|| "unset".to_string(), |q| q.to_string())
    );
    println!("reconciliations:     {}", stats.reconciliations);
    println!("corrections:         {}", stats.corrections);
    println!("suppressed:          {}", stats.suppressed);
    println!("history misses:      {}", stats.history_misses);
    println!("hard corrections:    {}", stats.hard_corrections);
    println!("pending inputs:      {}", stats.pending_inputs);
    println!("last confirmed:      #{}", stats.last_confirmed_sequence);
    println!(
        "snapshot history:    {}/{} ({:.0}% full, #{}..#{})",
        snapshots.count,
        snapshots.capacity,
        snapshots.fill_ratio() * 100.0,
        snapshots.oldest_sequence,
        snapshots.newest_sequence
    );
    println!("rejected messages:   {}", rejected);
    println!("largest render step: {:.2}", largest_render_jump);
    println!("hidden entity frames: {}", hidden_frames);
    println!(
        "local render:        ({:.1}, {:.1}) chunk ({}, {})",
        render.x, render.y, render.chunk_x, render.chunk_y
    );
    println!("server position:     ({:.1}, {:.1})", server_x, server_y);

    for entity in session.interpolator().entities() {
        let current = entity.current();
        println!(
            "{}: ({:.1}, {:.1}) rot {:.2} hp {:.0} visible={}",
            entity.id(),
            current.position.x,
            current.position.y,
            current.rotation,
            current.health,
            entity.is_visible()
        );
    }

    Ok(())
}
