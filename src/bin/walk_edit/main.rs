//! 步行动作编辑演示
//!
//! 在第 50 帧把左脚趾尖抬高 5 个单位（模拟一次鼠标拖动），
//! 再把这次编辑平滑到整段动作，打印前后各帧趾尖高度。
//!
//! 运行: RUST_LOG=info cargo run --features demo --bin walk_edit

use glam::Vec3;
use motion_edit::animation::procedural::LEFT_TOE;
use motion_edit::{AnimationSession, EditConfig, WalkCycle};

const FRAMES: usize = 100;
const EDIT_FRAME: usize = 50;
const LIFT: f32 = 5.0;

fn main() -> motion_edit::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let walk = WalkCycle::new(FRAMES)?;
    let mut session = AnimationSession::from_source(&walk, EditConfig::default())?;

    session.set_current_frame(EDIT_FRAME)?;
    let toe = session
        .reference(EDIT_FRAME)
        .and_then(|body| body.link(LEFT_TOE))
        .map(|link| link.world_position())
        .unwrap_or(Vec3::ZERO);
    if session.pick(toe).is_none() {
        log::error!("[Demo] 未能拾取左脚趾尖");
        return Ok(());
    }

    // 前 20 个事件逐步抬高目标，之后保持不动
    let mut last = None;
    for event in 0..60 {
        let ramp = ((event + 1) as f32 / 20.0).min(1.0);
        last = session.drag_selection(Vec3::new(0.0, LIFT * ramp, 0.0))?;
    }
    session.release();
    if let Some(outcome) = last {
        log::info!(
            "[Demo] 拖动结束: 残差 {:.4}, {}",
            outcome.residual,
            if outcome.converged { "收敛" } else { "未收敛" }
        );
    }

    let report = session.apply_motion_edit()?;
    log::info!(
        "[Demo] 平滑: 生效 {:?}, 丢弃 {:?}",
        report.applied_frames,
        report.skipped_frames
    );

    for frame in (30..=70).step_by(5) {
        let height = |body: Option<&motion_edit::Body>| {
            body.and_then(|b| b.link(LEFT_TOE)).map_or(0.0, |l| l.world_position().y)
        };
        println!(
            "frame {:3}: toe y {:7.3} -> {:7.3}",
            frame,
            height(session.reference(frame)),
            height(session.edited(frame))
        );
    }

    Ok(())
}
