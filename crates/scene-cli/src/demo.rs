//! Scripted walk through the branch lifecycle against in-memory backends.

use std::time::Duration;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::json;

use scene_engine::{BranchManager, JobState, ListQuery, NewElement};
use scene_server::{AppConfig, AppState};
use scene_types::{Branch, Dimensions3D, Element, ElementType, JobId, Point3D, Scene};

use crate::cli::{DemoArgs, OutputFormat};

pub async fn run(config: &AppConfig, args: &DemoArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let state = AppState::from_config(config);
    let manager = state.manager.as_ref();
    let wait = Duration::from_millis(args.wait_ms);
    let text = matches!(format, OutputFormat::Text);

    let scene = Scene::new("demo", "scenectl", "Demo flat", Dimensions3D::new(12.0, 2.7, 9.0));
    state.scenes.put_scene(scene.clone()).await?;
    let main = manager.create_branch(scene.id, "main", "baseline plan", None).await?.branch;
    state.scenes.set_main_branch(scene.id, main.id).await?;
    step(text, format!("scene {} with main branch {}", scene.name.bold(), main.id.short_id().yellow()));

    for i in 0..args.walls {
        let wall = NewElement::new(scene.id, main.id, ElementType::Wall, format!("wall-{i}"))
            .with_position(Point3D::new(i as f64 * 3.0, 0.0, 0.0))
            .with_dimensions(Dimensions3D::new(3.0, 2.7, 0.2));
        manager.create_element(main.id, wall).await?;
    }
    step(text, format!("placed {} walls on main", args.walls));

    let variant = fork(manager, &main, "variant-1", wait, text).await?;

    let Some(mut edited) = live(manager, &variant).await?.into_iter().next() else {
        bail!("variant has no elements; was replication disabled?");
    };
    edited.position.y += 1.5;
    let edited = manager.update_element(edited).await?;
    step(text, format!("moved {} in {}", edited.name.cyan(), variant.name.yellow()));

    let diff = manager.get_diff(variant.id, main.id).await?;
    step(
        text,
        format!(
            "diff {} → {}: {} added, {} modified, {} deleted",
            variant.name.yellow(),
            main.name.yellow(),
            diff.added.len(),
            diff.modified.len(),
            diff.deleted.len()
        ),
    );

    let snapshot = manager.create_snapshot(main.id, "before merge").await?;
    step(
        text,
        format!("snapshot '{}' of main ({} elements)", snapshot.name, snapshot.element_count),
    );

    let merge = manager.merge_branch(variant.id, main.id, true).await?;
    if merge.success {
        step(
            text,
            format!(
                "merged {} into {}: {} change(s), source now {}",
                variant.name.yellow(),
                main.name.yellow(),
                merge.changes_merged,
                merge.source_status
            ),
        );
    } else {
        for conflict in &merge.conflicts {
            warn(text, format!("conflict: {}", conflict.description));
        }
        for violation in merge.compliance_violations() {
            warn(text, violation);
        }
    }

    let restore = manager.restore_snapshot(snapshot.id).await?;
    step(
        text,
        format!(
            "restored main to '{}': {} restored, {} removed",
            snapshot.name, restore.restored, restore.removed
        ),
    );

    let report = manager.reconcile(scene.id).await?;
    if report.is_consistent() {
        step(text, format!("reconciled {} branches, all copies complete", report.branches_checked));
    } else {
        for issue in &report.issues {
            warn(text, format!("{}: {}", issue.branch_name, issue.reason));
        }
    }

    if !text {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "scene": scene,
                "diff": diff,
                "merge": merge,
                "restore": restore,
                "reconciliation": report,
            }))?
        );
    }

    manager.shutdown().await;
    Ok(())
}

async fn fork(
    manager: &BranchManager,
    parent: &Branch,
    name: &str,
    wait: Duration,
    text: bool,
) -> anyhow::Result<Branch> {
    let created = manager
        .create_branch(parent.scene_id, name, "", Some(parent.id))
        .await?;
    let job = created
        .replication_job
        .context("replication was not scheduled")?;
    await_copy(manager, job, wait).await?;
    let copied = live(manager, &created.branch).await?.len();
    step(
        text,
        format!("forked {} from {} ({copied} elements)", name.yellow(), parent.name.yellow()),
    );
    Ok(created.branch)
}

async fn await_copy(manager: &BranchManager, job: JobId, wait: Duration) -> anyhow::Result<()> {
    let status = manager.wait_for_replication(job, wait).await?;
    match status.state {
        JobState::Completed(_) => Ok(()),
        JobState::Failed(reason) => bail!("replication failed: {reason}"),
        other => bail!("replication did not finish in {wait:?}: {other:?}"),
    }
}

async fn live(manager: &BranchManager, branch: &Branch) -> anyhow::Result<Vec<Element>> {
    Ok(manager.list_elements(branch.id, &ListQuery::default()).await?)
}

fn step(text: bool, line: String) {
    if text {
        println!("{} {line}", "✓".green().bold());
    }
}

fn warn(text: bool, line: String) {
    if text {
        println!("{} {line}", "!".red().bold());
    }
}
