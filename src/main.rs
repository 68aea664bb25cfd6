//! Party Dash Server
//!
//! Demo driver for the deterministic round simulation: runs one round of
//! each minigame with scripted inputs and logs the signals a host UI would
//! render.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use party_dash::{
    game::{
        character::{CharacterKind, OpenSky},
        round::{ConnectionId, RoundPhase},
        world::{TickInputs, World},
    },
    FixedVec2, GameConfig, InputFrame, Signal, SignalKind, FIXED_ONE, TICK_RATE, VERSION,
};

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Party Dash Server v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    let config = match std::env::args().nth(1) {
        Some(path) => GameConfig::from_json_file(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => GameConfig::default(),
    };

    demo_round(config.clone(), CharacterKind::Runner)?;
    demo_round(config, CharacterKind::Croucher)?;
    Ok(())
}

/// Run one scripted round to completion and log what a host would render.
fn demo_round(config: GameConfig, kind: CharacterKind) -> anyhow::Result<()> {
    info!("=== Starting Demo Round ({:?}) ===", kind);

    let mut world = World::new(config, kind, Box::new(OpenSky))?;

    // A UI collaborator: log every text and lifecycle signal as it fires.
    let bus = world.bus();
    for signal_kind in [
        SignalKind::CountdownTextChanged,
        SignalKind::InstructionTextChanged,
        SignalKind::RoundStarted,
        SignalKind::RoundOver,
        SignalKind::WinnerDeclared,
        SignalKind::RequestSceneLoad,
    ] {
        bus.subscribe(signal_kind, |signal| match signal {
            Signal::CountdownTextChanged(text) => info!("[UI] countdown: {text}"),
            Signal::InstructionTextChanged(text) if text.is_empty() => {
                info!("[UI] instruction cleared")
            }
            Signal::InstructionTextChanged(text) => info!("[UI] instruction: {text}"),
            Signal::WinnerDeclared(number) => info!("[UI] winner: {number}"),
            Signal::RequestSceneLoad(index) => info!("[scene] load request: {index}"),
            other => info!("[round] {other:?}"),
        });
    }

    // Three joins land during the window, the fourth connection is late on
    // purpose and gets refused below.
    let slots: Vec<_> = (1..=3)
        .map(|i| world.join(ConnectionId(i)))
        .collect::<Result<_, _>>()?;

    // Per-slot stick strength for the runner minigame.
    const AXES: [i8; 3] = [127, 95, 63];

    let mut ticks = 0u32;
    let mut late_join_tried = false;
    while !matches!(world.phase(), RoundPhase::Done) {
        let mut inputs = TickInputs::new();
        for (i, slot) in slots.iter().enumerate() {
            let mut frame = InputFrame::new();
            match kind {
                CharacterKind::Runner => frame = InputFrame::with_movement(AXES[i], 0),
                CharacterKind::Croucher => {
                    // Duck for a second out of every three, staggered per
                    // player so the log shows the edges separately.
                    let beat = (ticks + i as u32 * TICK_RATE) % (3 * TICK_RATE);
                    if beat == 0 {
                        frame.set_action_pressed();
                    } else if beat == TICK_RATE {
                        frame.set_action_released();
                    }
                }
            }
            inputs.set_frame(*slot, frame);
        }

        // A scripted hazard clips the leader partway through.
        if ticks == 8 * TICK_RATE {
            inputs.add_hazard_contact(slots[0], FixedVec2::new(-FIXED_ONE, 0));
            info!("[hazard] contact on slot {}", slots[0].0);
        }

        world.tick(&inputs);
        ticks += 1;

        if !late_join_tried && !world.joining_enabled() {
            late_join_tried = true;
            if let Err(error) = world.join(ConnectionId(99)) {
                info!("late join refused: {error}");
            }
        }

        // The script should never outlive a round by this much.
        if ticks > 120 * TICK_RATE {
            anyhow::bail!("demo round did not finish within 120 seconds");
        }
    }

    info!("=== Round Results ({} ticks) ===", ticks);
    for view in world.views() {
        let (x, y) = view.position.to_floats();
        match (view.player_number, view.placement) {
            (Some(number), Some(placement)) => {
                info!("#{placement}: {number} at ({x:.2}, {y:.2})")
            }
            (Some(number), None) => info!("dnf: {number} at ({x:.2}, {y:.2})"),
            _ => {}
        }
    }

    world.teardown_round();
    Ok(())
}
