//! Command implementations.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tasknest_core::app::{
    BucketRepository, DocumentSession, Environment, StoreConfig, TaskRepository,
};
use tasknest_core::domain::{Bucket, BucketId, Outcome, ProjectId, Task, TaskId};
use tasknest_core::impls::{FileSettings, FileStateStore, LocalHost, MemorySettings, MemoryStateStore};
use tasknest_core::ports::{SettingsStore, SharingSettings};
use tracing::info;

use crate::cli::{BucketCommand, ShareCommand, TaskCommand};

/// Sessions over the on-disk store and settings in `data_dir`.
fn open(data_dir: &Path, config: StoreConfig) -> Result<Arc<DocumentSession>> {
    let sessions = DocumentSession::builder()
        .config(config)
        .state_store(Arc::new(FileStateStore::new(data_dir)))
        .environment(Environment::local(Arc::new(FileSettings::new(data_dir))))
        .build()?;
    Ok(Arc::new(sessions))
}

fn report<T>(outcome: Outcome<T>, what: impl std::fmt::Display) -> Result<()> {
    match outcome {
        Outcome::Applied(_) => Ok(()),
        Outcome::NotFound => bail!("{what} not found"),
        Outcome::Rejected(violation) => bail!("{what}: {violation}"),
    }
}

fn print_task(task: &Task) {
    let mark = if task.done { "x" } else { " " };
    println!(
        "[{mark}] {:>14}  {:<40} {} pos={} kanban={}",
        task.id.get(),
        task.title,
        task.bucket_id,
        task.position,
        task.kanban_position
    );
}

pub async fn run_task(command: TaskCommand, data_dir: &Path, config: StoreConfig) -> Result<()> {
    let sessions = open(data_dir, config)?;
    let tasks = TaskRepository::new(sessions.clone());

    match command {
        TaskCommand::List {
            project,
            bucket,
            json,
        } => {
            let list = match bucket {
                Some(bucket) => {
                    let mut list = tasks.list_tasks_of_bucket(BucketId::new(bucket)).await?;
                    list.sort_by(|a, b| a.kanban_position.total_cmp(&b.kanban_position));
                    list
                }
                None => tasks.list_tasks(ProjectId::new(project)).await?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else {
                list.iter().for_each(print_task);
            }
        }
        TaskCommand::Add {
            title,
            project,
            bucket,
            position,
        } => {
            let mut task = Task::new(ProjectId::new(project), title).with_position(position);
            if let Some(bucket) = bucket {
                task = task.with_bucket(BucketId::new(bucket));
            }
            task.created = Some(Utc::now());
            task.updated = task.created;
            let created = tasks.create_task(task).await?;
            println!("created {} in {}", created.id, created.bucket_id);
        }
        TaskCommand::Done { id } => {
            let id = TaskId::new(id);
            let mut task = tasks
                .get_task(id)
                .await?
                .with_context(|| format!("{id} not found"))?;
            task.done = true;
            task.done_at = Some(Utc::now());
            task.updated = task.done_at;
            report(tasks.update_task(task).await?, id)?;
            println!("{id} done");
        }
        TaskCommand::Rm { id } => {
            let id = TaskId::new(id);
            report(tasks.delete_task(id).await?, id)?;
            println!("deleted {id}");
        }
    }

    sessions.shutdown().await;
    Ok(())
}

pub async fn run_bucket(command: BucketCommand, data_dir: &Path, config: StoreConfig) -> Result<()> {
    let sessions = open(data_dir, config)?;
    let buckets = BucketRepository::new(sessions.clone());

    match command {
        BucketCommand::List { project, json } => {
            let list = buckets.list_buckets(ProjectId::new(project)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else {
                for bucket in &list {
                    println!(
                        "{} {:?} pos={} limit={} tasks={}",
                        bucket.id,
                        bucket.title,
                        bucket.position,
                        bucket.limit,
                        bucket.tasks.len()
                    );
                    bucket.tasks.iter().for_each(print_task);
                }
            }
        }
        BucketCommand::Add {
            title,
            project,
            limit,
        } => {
            let mut bucket = Bucket::new(ProjectId::new(project), title);
            bucket.limit = limit;
            let created = buckets.create_bucket(bucket).await?;
            println!("created {} at position {}", created.id, created.position);
        }
        BucketCommand::Rm { id } => {
            let id = BucketId::new(id);
            report(buckets.delete_bucket(id).await?, id)?;
            println!("deleted {id}");
        }
    }

    sessions.shutdown().await;
    Ok(())
}

pub async fn run_share(command: ShareCommand, data_dir: &Path) -> Result<()> {
    let settings = FileSettings::new(data_dir);
    let current = SharingSettings::load(&settings).await?;

    let next = match command {
        ShareCommand::Enable { room, password } => SharingSettings {
            enabled: true,
            room_name: Some(room),
            room_password: Some(password),
        },
        ShareCommand::Disable => SharingSettings {
            enabled: false,
            ..current
        },
        ShareCommand::Show => {
            print_sharing(&current);
            return Ok(());
        }
    };
    next.save(&settings as &dyn SettingsStore).await?;
    print_sharing(&next);
    Ok(())
}

fn print_sharing(sharing: &SharingSettings) {
    println!("enabled:  {}", sharing.enabled);
    println!("room:     {}", sharing.room_name.as_deref().unwrap_or("-"));
    println!(
        "password: {}",
        if sharing.room_password.is_some() { "set" } else { "-" }
    );
    println!("active:   {}", sharing.active_room().is_some());
    println!("mesh:     not available in this binary, sessions stay local");
}

/// Two replicas in one process, each with its own memory store, relayed by a `LocalHost`.
pub async fn run_sync_demo(config: StoreConfig) -> Result<()> {
    let host = LocalHost::new();
    let replica = |addr: &str| -> Result<Arc<DocumentSession>> {
        let env = Environment::local(Arc::new(MemorySettings::new()))
            .with_host(Arc::new(host.endpoint(addr)));
        let sessions = DocumentSession::builder()
            .config(config.clone())
            .state_store(Arc::new(MemoryStateStore::new()))
            .environment(env)
            .build()?;
        Ok(Arc::new(sessions))
    };
    let (alice, bob) = (replica("alice")?, replica("bob")?);
    let (alice_tasks, bob_tasks) = (
        TaskRepository::new(alice.clone()),
        TaskRepository::new(bob.clone()),
    );
    let project = ProjectId::new(1);

    alice_tasks
        .create_task(Task::new(project, "written by alice").with_position(1.0))
        .await?;
    bob_tasks
        .create_task(Task::new(project, "written by bob").with_position(2.0))
        .await?;
    BucketRepository::new(bob.clone())
        .create_bucket(Bucket::new(project, "Done"))
        .await?;

    let mut converged = false;
    for _ in 0..100 {
        let (a, b) = (
            alice_tasks.list_tasks(project).await?,
            bob_tasks.list_tasks(project).await?,
        );
        if a.len() == 2 && a == b {
            converged = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    info!(converged, relayed = host.last_serial(), "sync demo finished");

    for (name, sessions) in [("alice", &alice), ("bob", &bob)] {
        println!("== {name}");
        for bucket in BucketRepository::new(Arc::clone(sessions)).list_buckets(project).await? {
            println!("{} {:?}", bucket.id, bucket.title);
            bucket.tasks.iter().for_each(print_task);
        }
    }

    alice.shutdown().await;
    bob.shutdown().await;
    if !converged {
        bail!("replicas did not converge");
    }
    Ok(())
}
