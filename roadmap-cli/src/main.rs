mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use colored::{ColoredString, Colorize};
use tracing_subscriber::EnvFilter;

use roadmap_core::{
    export, AcStatus, Config, DocumentAttachment, ExportFormat, IterationStatus,
    NewAcceptanceCriteria, NewAdr, NewDocument, NewIteration, NewRoadmap, NewTask, NewTrack,
    Progress, Repository, TaskFilter, TaskStatus, TrackFilter, TrackStatus,
};

use crate::cli::{
    AcCommand, AdrCommand, Cli, Command, ConfigCommand, DocCommand, IterCommand, RoadmapCommand,
    TaskCommand, TrackCommand,
};

const LOG_ENV: &str = "ROADMAP_LOG";

fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        let kind = err
            .downcast_ref::<roadmap_core::Error>()
            .map(|e| e.kind().to_string())
            .unwrap_or_else(|| "error".to_string());
        eprintln!("{} {:#}", format!("{}:", kind).red().bold(), err);
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::resolve(cli.config.as_deref())?;
    if let Some(project) = &cli.project {
        config.project_code = Some(project.clone());
    }
    if let Some(db) = &cli.db {
        config.database = Some(db.clone());
    }

    match &cli.command {
        // Config commands never touch the database
        Command::Config(cmd) => handle_config_command(cmd, &cli, &config),
        Command::Roadmap(cmd) => with_repo(&config, |repo| handle_roadmap_command(cmd, repo)),
        Command::Track(cmd) => with_repo(&config, |repo| handle_track_command(cmd, repo)),
        Command::Task(cmd) => with_repo(&config, |repo| handle_task_command(cmd, repo)),
        Command::Iter(cmd) => with_repo(&config, |repo| handle_iter_command(cmd, repo)),
        Command::Ac(cmd) => with_repo(&config, |repo| handle_ac_command(cmd, repo)),
        Command::Adr(cmd) => with_repo(&config, |repo| handle_adr_command(cmd, repo)),
        Command::Doc(cmd) => with_repo(&config, |repo| handle_doc_command(cmd, repo)),
        Command::Stats => with_repo(&config, show_stats),
        Command::Export { format, output } => with_repo(&config, |repo| {
            handle_export_command(repo, *format, output.as_deref())
        }),
    }
}

/// Opens the project, runs `f`, and closes the project even when `f` fails
fn with_repo<F>(config: &Config, f: F) -> Result<()>
where
    F: FnOnce(&Repository) -> Result<()>,
{
    let repo = Repository::open(config)?;
    let result = f(&repo);
    repo.close()?;
    result
}

// =============================================================================
// Rendering helpers
// =============================================================================

fn track_status(status: TrackStatus) -> ColoredString {
    match status {
        TrackStatus::NotStarted => status.as_str().normal(),
        TrackStatus::InProgress => status.as_str().blue(),
        TrackStatus::Complete => status.as_str().green(),
        TrackStatus::Blocked => status.as_str().red(),
        TrackStatus::Waiting => status.as_str().yellow(),
    }
}

fn task_status(status: TaskStatus) -> ColoredString {
    match status {
        TaskStatus::Todo => status.as_str().normal(),
        TaskStatus::InProgress => status.as_str().blue(),
        TaskStatus::Done => status.as_str().green(),
    }
}

fn iteration_status(status: IterationStatus) -> ColoredString {
    match status {
        IterationStatus::Planned => status.as_str().normal(),
        IterationStatus::Current => status.as_str().blue().bold(),
        IterationStatus::Complete => status.as_str().green(),
    }
}

fn ac_status(status: AcStatus) -> ColoredString {
    match status {
        AcStatus::Pending => status.as_str().yellow(),
        AcStatus::Verified => status.as_str().green(),
        AcStatus::Failed => status.as_str().red(),
    }
}

fn print_progress(progress: &Progress) {
    println!(
        "Progress: {}/{} done ({} in progress, {} todo)",
        progress.done.to_string().green(),
        progress.total(),
        progress.in_progress,
        progress.todo
    );
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

// =============================================================================
// Roadmaps
// =============================================================================

fn handle_roadmap_command(cmd: &RoadmapCommand, repo: &Repository) -> Result<()> {
    match cmd {
        RoadmapCommand::Add { id, title, vision } => {
            let roadmap = repo.roadmaps().create(NewRoadmap {
                id: id.clone(),
                title: title.clone(),
                vision: vision.clone(),
            })?;
            println!("{} {}", "Roadmap created:".green(), roadmap.id);
        }
        RoadmapCommand::List => {
            let roadmaps = repo.roadmaps().list()?;
            if roadmaps.is_empty() {
                println!("{}", "No roadmaps found.".yellow());
                return Ok(());
            }
            println!("{:<20} | {:<40}", "ID", "Title");
            println!("{}", "-".repeat(63));
            for roadmap in roadmaps {
                println!("{:<20} | {:<40}", roadmap.id, roadmap.title);
            }
        }
        RoadmapCommand::Show { id } => {
            let roadmap = repo.roadmaps().get(id)?;
            println!("{}", roadmap.title.bold());
            println!("ID: {}", roadmap.id);
            println!("Vision: {}", or_dash(&roadmap.vision));

            let tracks = repo.tracks().list(&TrackFilter {
                roadmap_id: Some(roadmap.id.clone()),
                status: None,
            })?;
            println!("\n{}:", "Tracks".green());
            for track in tracks {
                println!(
                    "  {:<16} {:<12} {}",
                    track.id,
                    track_status(track.status),
                    track.title
                );
            }
        }
        RoadmapCommand::Update { id, title, vision } => {
            let mut roadmap = repo.roadmaps().get(id)?;
            if let Some(title) = title {
                roadmap.title = title.clone();
            }
            if let Some(vision) = vision {
                roadmap.vision = vision.clone();
            }
            repo.roadmaps().update(&roadmap)?;
            println!("{} {}", "Roadmap updated:".green(), roadmap.id);
        }
        RoadmapCommand::Delete { id } => {
            repo.roadmaps().delete(id)?;
            println!("{} {}", "Roadmap deleted:".green(), id);
        }
    }
    Ok(())
}

// =============================================================================
// Tracks
// =============================================================================

fn handle_track_command(cmd: &TrackCommand, repo: &Repository) -> Result<()> {
    match cmd {
        TrackCommand::Add {
            title,
            roadmap,
            description,
            rank,
            status,
        } => {
            let mut track = NewTrack::new(roadmap.clone(), title.clone());
            track.description = description.clone();
            track.rank = *rank;
            if let Some(status) = status {
                track.status = *status;
            }
            let track = repo.tracks().create(track)?;
            println!("{} {}", "Track created:".green(), track.id.bold());
        }
        TrackCommand::List { roadmap, status } => {
            let tracks = repo.tracks().list(&TrackFilter {
                roadmap_id: roadmap.clone(),
                status: *status,
            })?;
            if tracks.is_empty() {
                println!("{}", "No tracks found.".yellow());
                return Ok(());
            }
            println!(
                "{:<16} | {:<5} | {:<12} | {:<30} | {}",
                "ID", "Rank", "Status", "Title", "Depends on"
            );
            println!("{}", "-".repeat(100));
            for track in tracks {
                println!(
                    "{:<16} | {:<5} | {:<12} | {:<30} | {}",
                    track.id,
                    track.rank,
                    track_status(track.status),
                    track.title,
                    or_dash(&track.dependencies.join(", "))
                );
            }
        }
        TrackCommand::Show { id } => {
            let track = repo.tracks().get(id)?;
            println!("{}", track.title.bold());
            println!("ID: {}", track.id);
            println!("Roadmap: {}", track.roadmap_id);
            println!("Status: {}", track_status(track.status));
            println!("Rank: {}", track.rank);
            println!("Description: {}", or_dash(&track.description));
            println!("Depends on: {}", or_dash(&track.dependencies.join(", ")));
            let dependents = repo.tracks().dependents(&track.id)?;
            println!("Needed by: {}", or_dash(&dependents.join(", ")));
            print_progress(&repo.aggregate().track_progress(&track.id)?);
        }
        TrackCommand::Update {
            id,
            title,
            description,
            status,
            rank,
            roadmap,
        } => {
            let mut track = repo.tracks().get(id)?;
            if let Some(title) = title {
                track.title = title.clone();
            }
            if let Some(description) = description {
                track.description = description.clone();
            }
            if let Some(status) = status {
                track.status = *status;
            }
            if let Some(rank) = rank {
                track.rank = *rank;
            }
            if let Some(roadmap) = roadmap {
                track.roadmap_id = roadmap.clone();
            }
            repo.tracks().update(&track)?;
            println!("{} {}", "Track updated:".green(), track.id);
        }
        TrackCommand::Delete { id, force } => {
            let dependents = repo.tracks().dependents(id)?;
            if !dependents.is_empty() && !force {
                anyhow::bail!(
                    "track {} is needed by {}; pass --force to delete it and its edges",
                    id,
                    dependents.join(", ")
                );
            }
            repo.tracks().delete(id)?;
            println!("{} {}", "Track deleted:".green(), id);
        }
        TrackCommand::Depend { id, on } => {
            repo.tracks().add_dependency(id, on)?;
            println!("{} {} -> {}", "Dependency added:".green(), id, on);
        }
        TrackCommand::Undepend { id, on } => {
            repo.tracks().remove_dependency(id, on)?;
            println!("{} {} -> {}", "Dependency removed:".green(), id, on);
        }
        TrackCommand::Deps { id } => {
            let dependencies = repo.tracks().dependencies(id)?;
            let dependents = repo.tracks().dependents(id)?;
            println!("{}:", "Depends on".green());
            for dep in &dependencies {
                println!("  {}", dep);
            }
            println!("{}:", "Needed by".green());
            for dep in &dependents {
                println!("  {}", dep);
            }
        }
        TrackCommand::Check { id } => {
            repo.tracks().validate_no_cycles(id)?;
            println!("{} no cycle reachable from {}", "OK:".green(), id);
        }
    }
    Ok(())
}

// =============================================================================
// Tasks
// =============================================================================

fn handle_task_command(cmd: &TaskCommand, repo: &Repository) -> Result<()> {
    match cmd {
        TaskCommand::Add {
            title,
            track,
            description,
            rank,
        } => {
            let mut task = NewTask::new(track.clone(), title.clone());
            task.description = description.clone();
            task.rank = *rank;
            let task = repo.tasks().create(task)?;
            println!("{} {}", "Task created:".green(), task.id.bold());
        }
        TaskCommand::List { track, status } => {
            let tasks = repo.tasks().list(&TaskFilter {
                track_id: track.clone(),
                status: *status,
            })?;
            if tasks.is_empty() {
                println!("{}", "No tasks found.".yellow());
                return Ok(());
            }
            println!(
                "{:<16} | {:<16} | {:<12} | {}",
                "ID", "Track", "Status", "Title"
            );
            println!("{}", "-".repeat(80));
            for task in tasks {
                println!(
                    "{:<16} | {:<16} | {:<12} | {}",
                    task.id,
                    task.track_id,
                    task_status(task.status),
                    task.title
                );
            }
        }
        TaskCommand::Show { id } => {
            let task = repo.tasks().get(id)?;
            println!("{}", task.title.bold());
            println!("ID: {}", task.id);
            println!("Track: {}", task.track_id);
            println!("Status: {}", task_status(task.status));
            println!("Rank: {}", task.rank);
            println!("Description: {}", or_dash(&task.description));

            let criteria = repo.acceptance_criteria().list_for_task(&task.id)?;
            if !criteria.is_empty() {
                println!("\n{}:", "Acceptance criteria".green());
                for ac in criteria {
                    println!("  {:<14} [{}] {}", ac.id, ac_status(ac.status), ac.description);
                }
            }
        }
        TaskCommand::Update {
            id,
            title,
            description,
            status,
            rank,
            track,
        } => {
            let mut task = repo.tasks().get(id)?;
            if let Some(title) = title {
                task.title = title.clone();
            }
            if let Some(description) = description {
                task.description = description.clone();
            }
            if let Some(status) = status {
                task.status = *status;
            }
            if let Some(rank) = rank {
                task.rank = *rank;
            }
            if let Some(track) = track {
                task.track_id = track.clone();
            }
            repo.tasks().update(&task)?;
            println!("{} {}", "Task updated:".green(), task.id);
        }
        TaskCommand::Delete { id } => {
            repo.tasks().delete(id)?;
            println!("{} {}", "Task deleted:".green(), id);
        }
    }
    Ok(())
}

// =============================================================================
// Iterations
// =============================================================================

fn handle_iter_command(cmd: &IterCommand, repo: &Repository) -> Result<()> {
    let iterations = repo.iterations();
    match cmd {
        IterCommand::Add {
            name,
            number,
            goal,
            deliverable,
            rank,
        } => {
            let mut iteration = NewIteration::new(*number, name.clone());
            iteration.goal = goal.clone();
            iteration.deliverable = deliverable.clone();
            iteration.rank = *rank;
            let iteration = iterations.create(iteration)?;
            println!(
                "{} {} ({})",
                "Iteration created:".green(),
                iteration.number.to_string().bold(),
                iteration.name
            );
        }
        IterCommand::List => {
            let list = iterations.list()?;
            if list.is_empty() {
                println!("{}", "No iterations found.".yellow());
                return Ok(());
            }
            println!("{:<6} | {:<10} | {:<6} | {:<30}", "Number", "Status", "Tasks", "Name");
            println!("{}", "-".repeat(60));
            for iteration in list {
                println!(
                    "{:<6} | {:<10} | {:<6} | {:<30}",
                    iteration.number,
                    iteration_status(iteration.status),
                    iteration.task_ids.len(),
                    iteration.name
                );
            }
        }
        IterCommand::Show { number } => {
            let iteration = iterations.get(*number)?;
            println!("{}", iteration.name.bold());
            println!("Number: {}", iteration.number);
            println!("Status: {}", iteration_status(iteration.status));
            println!("Goal: {}", or_dash(&iteration.goal));
            println!("Deliverable: {}", or_dash(&iteration.deliverable));
            if let Some(started) = iteration.started_at {
                println!("Started: {}", started.format("%Y-%m-%d %H:%M"));
            }
            if let Some(completed) = iteration.completed_at {
                println!("Completed: {}", completed.format("%Y-%m-%d %H:%M"));
            }
            let tasks = iterations.tasks(iteration.number)?;
            if !tasks.is_empty() {
                println!("\n{}:", "Tasks".green());
                for task in tasks {
                    println!("  {:<16} {:<12} {}", task.id, task_status(task.status), task.title);
                }
            }
            print_progress(&repo.aggregate().iteration_progress(iteration.number)?);
        }
        IterCommand::Update {
            number,
            name,
            goal,
            deliverable,
            rank,
        } => {
            let mut iteration = iterations.get(*number)?;
            if let Some(name) = name {
                iteration.name = name.clone();
            }
            if let Some(goal) = goal {
                iteration.goal = goal.clone();
            }
            if let Some(deliverable) = deliverable {
                iteration.deliverable = deliverable.clone();
            }
            if let Some(rank) = rank {
                iteration.rank = *rank;
            }
            iterations.update(&iteration)?;
            println!("{} {}", "Iteration updated:".green(), number);
        }
        IterCommand::Delete { number } => {
            iterations.delete(*number)?;
            println!("{} {}", "Iteration deleted:".green(), number);
        }
        IterCommand::Start { number } => {
            let iteration = iterations.start(*number)?;
            println!(
                "{} {} is {}",
                "Iteration".green(),
                number,
                iteration_status(iteration.status)
            );
        }
        IterCommand::Complete { number } => {
            let iteration = iterations.complete(*number)?;
            println!(
                "{} {} is {}",
                "Iteration".green(),
                number,
                iteration_status(iteration.status)
            );
        }
        IterCommand::Status { number, status } => {
            let iteration = iterations.set_status(*number, *status)?;
            println!(
                "{} {} is {}",
                "Iteration".green(),
                number,
                iteration_status(iteration.status)
            );
        }
        IterCommand::Current => match iterations.current()? {
            Some(iteration) => println!(
                "{} {} ({})",
                "Current iteration:".green(),
                iteration.number.to_string().bold(),
                iteration.name
            ),
            None => println!("{}", "No iteration is current.".yellow()),
        },
        IterCommand::AddTask { number, task } => {
            iterations.add_task(*number, task)?;
            println!("{} {} -> iteration {}", "Task added:".green(), task, number);
        }
        IterCommand::RemoveTask { number, task } => {
            iterations.remove_task(*number, task)?;
            println!("{} {} from iteration {}", "Task removed:".green(), task, number);
        }
    }
    Ok(())
}

// =============================================================================
// Acceptance criteria
// =============================================================================

fn handle_ac_command(cmd: &AcCommand, repo: &Repository) -> Result<()> {
    match cmd {
        AcCommand::Add { description, task } => {
            let ac = repo.acceptance_criteria().create(NewAcceptanceCriteria {
                task_id: task.clone(),
                description: description.clone(),
            })?;
            println!("{} {}", "Acceptance criterion created:".green(), ac.id.bold());
        }
        AcCommand::List { task } => {
            let criteria = repo.acceptance_criteria().list_for_task(task)?;
            if criteria.is_empty() {
                println!("{}", "No acceptance criteria found.".yellow());
                return Ok(());
            }
            for ac in criteria {
                println!("{:<14} [{}] {}", ac.id, ac_status(ac.status), ac.description);
                if !ac.notes.is_empty() {
                    println!("{:<14} {}", "", ac.notes.dimmed());
                }
            }
        }
        AcCommand::Update {
            id,
            description,
            status,
            notes,
        } => {
            let mut ac = repo.acceptance_criteria().get(id)?;
            if let Some(description) = description {
                ac.description = description.clone();
            }
            if let Some(status) = status {
                ac.status = *status;
            }
            if let Some(notes) = notes {
                ac.notes = notes.clone();
            }
            repo.acceptance_criteria().update(&ac)?;
            println!("{} {}", "Acceptance criterion updated:".green(), ac.id);
        }
        AcCommand::Delete { id } => {
            repo.acceptance_criteria().delete(id)?;
            println!("{} {}", "Acceptance criterion deleted:".green(), id);
        }
    }
    Ok(())
}

// =============================================================================
// ADRs
// =============================================================================

fn handle_adr_command(cmd: &AdrCommand, repo: &Repository) -> Result<()> {
    match cmd {
        AdrCommand::Add {
            title,
            track,
            context,
            decision,
            consequences,
            status,
        } => {
            let mut adr = NewAdr::new(track.clone(), title.clone());
            adr.context = context.clone();
            adr.decision = decision.clone();
            adr.consequences = consequences.clone();
            if let Some(status) = status {
                adr.status = *status;
            }
            let adr = repo.adrs().create(adr)?;
            println!("{} {}", "ADR created:".green(), adr.id.bold());
        }
        AdrCommand::List { track } => {
            let adrs = repo.adrs().list(track.as_deref())?;
            if adrs.is_empty() {
                println!("{}", "No ADRs found.".yellow());
                return Ok(());
            }
            println!("{:<14} | {:<16} | {:<11} | {}", "ID", "Track", "Status", "Title");
            println!("{}", "-".repeat(80));
            for adr in adrs {
                let status = match &adr.superseded_by {
                    Some(by) => format!("{} by {}", adr.status, by),
                    None => adr.status.to_string(),
                };
                println!(
                    "{:<14} | {:<16} | {:<11} | {}",
                    adr.id, adr.track_id, status, adr.title
                );
            }
        }
        AdrCommand::Show { id } => {
            let adr = repo.adrs().get(id)?;
            println!("{}", adr.title.bold());
            println!("ID: {}", adr.id);
            println!("Track: {}", adr.track_id);
            println!("Status: {}", adr.status);
            if let Some(by) = &adr.superseded_by {
                println!("Superseded by: {}", by.yellow());
            }
            println!("\n{}:\n{}", "Context".green(), or_dash(&adr.context));
            println!("\n{}:\n{}", "Decision".green(), or_dash(&adr.decision));
            println!("\n{}:\n{}", "Consequences".green(), or_dash(&adr.consequences));
        }
        AdrCommand::Update {
            id,
            title,
            context,
            decision,
            consequences,
            status,
        } => {
            let mut adr = repo.adrs().get(id)?;
            if let Some(title) = title {
                adr.title = title.clone();
            }
            if let Some(context) = context {
                adr.context = context.clone();
            }
            if let Some(decision) = decision {
                adr.decision = decision.clone();
            }
            if let Some(consequences) = consequences {
                adr.consequences = consequences.clone();
            }
            if let Some(status) = status {
                adr.status = *status;
            }
            repo.adrs().update(&adr)?;
            println!("{} {}", "ADR updated:".green(), adr.id);
        }
        AdrCommand::Supersede { id, by } => {
            repo.adrs().supersede(id, by)?;
            println!("{} {} superseded by {}", "ADR updated:".green(), id, by);
        }
        AdrCommand::Delete { id } => {
            repo.adrs().delete(id)?;
            println!("{} {}", "ADR deleted:".green(), id);
        }
    }
    Ok(())
}

// =============================================================================
// Documents
// =============================================================================

fn handle_doc_command(cmd: &DocCommand, repo: &Repository) -> Result<()> {
    match cmd {
        DocCommand::Add {
            title,
            doc_type,
            content,
            track,
            iteration,
        } => {
            let document = repo.documents().create(NewDocument {
                title: title.clone(),
                doc_type: *doc_type,
                content: content.clone(),
                track_id: track.clone(),
                iteration_number: *iteration,
            })?;
            println!("{} {}", "Document created:".green(), document.id.to_string().bold());
        }
        DocCommand::List {
            track,
            iteration,
            unattached,
        } => {
            let filter = if *unattached {
                Some(DocumentAttachment::Unattached)
            } else if let Some(track) = track {
                Some(DocumentAttachment::Track(track.clone()))
            } else {
                iteration.map(DocumentAttachment::Iteration)
            };
            let documents = repo.documents().list(filter.as_ref())?;
            if documents.is_empty() {
                println!("{}", "No documents found.".yellow());
                return Ok(());
            }
            println!("{:<5} | {:<13} | {:<18} | {}", "ID", "Type", "Attached to", "Title");
            println!("{}", "-".repeat(80));
            for document in documents {
                let target = match (&document.track_id, document.iteration_number) {
                    (Some(track), _) => track.clone(),
                    (None, Some(number)) => format!("iteration {}", number),
                    (None, None) => "-".to_string(),
                };
                println!(
                    "{:<5} | {:<13} | {:<18} | {}",
                    document.id,
                    document.doc_type.as_str(),
                    target,
                    document.title
                );
            }
        }
        DocCommand::Show { id } => {
            let document = repo.documents().get(*id)?;
            println!("{}", document.title.bold());
            println!("ID: {}", document.id);
            println!("Type: {}", document.doc_type);
            if let Some(track) = &document.track_id {
                println!("Track: {}", track);
            }
            if let Some(number) = document.iteration_number {
                println!("Iteration: {}", number);
            }
            println!("\n{}", document.content);
        }
        DocCommand::Attach {
            id,
            track,
            iteration,
        } => {
            let attachment = DocumentAttachment::from_parts(track.clone(), *iteration)?;
            repo.documents().attach(*id, attachment)?;
            println!("{} {}", "Document attached:".green(), id);
        }
        DocCommand::Detach { id } => {
            repo.documents().detach(*id)?;
            println!("{} {}", "Document detached:".green(), id);
        }
        DocCommand::Delete { id } => {
            repo.documents().delete(*id)?;
            println!("{} {}", "Document deleted:".green(), id);
        }
    }
    Ok(())
}

// =============================================================================
// Project-wide commands
// =============================================================================

fn show_stats(repo: &Repository) -> Result<()> {
    let stats = repo.aggregate().stats()?;
    println!("{} {}", "Project".bold(), repo.project_code().bold());
    if let Some(path) = repo.database().path() {
        println!("Database: {}", path.display());
    }
    println!("  Roadmaps:            {}", stats.roadmaps);
    println!("  Tracks:              {}", stats.tracks);
    println!("  Dependencies:        {}", stats.dependencies);
    println!("  Tasks:               {}", stats.tasks);
    println!("  Iterations:          {}", stats.iterations);
    println!("  Acceptance criteria: {}", stats.acceptance_criteria);
    println!("  ADRs:                {}", stats.adrs);
    println!("  Documents:           {}", stats.documents);

    if let Some(current) = repo.iterations().current()? {
        println!(
            "Current iteration: {} ({})",
            current.number.to_string().blue().bold(),
            current.name
        );
    }
    Ok(())
}

fn handle_export_command(
    repo: &Repository,
    format: Option<ExportFormat>,
    output: Option<&std::path::Path>,
) -> Result<()> {
    let format = format
        .or_else(|| output.and_then(ExportFormat::from_path))
        .unwrap_or(ExportFormat::Json);
    let snapshot = repo.aggregate().snapshot()?;

    match output {
        Some(path) => {
            export::write_snapshot(&snapshot, path, format)
                .with_context(|| format!("Failed to export to {}", path.display()))?;
            println!("{} {}", "Exported to".green(), path.display());
            println!("  Tracks: {}", snapshot.tracks.len());
            println!("  Tasks: {}", snapshot.tasks.len());
            println!("  Iterations: {}", snapshot.iterations.len());
        }
        None => print!("{}", export::render_snapshot(&snapshot, format)?),
    }
    Ok(())
}

fn handle_config_command(cmd: &ConfigCommand, cli: &Cli, config: &Config) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            match Config::resolve_path(cli.config.as_deref()) {
                Some(path) => println!("Config file: {}", path.display()),
                None => println!("Config file: {}", "(none)".dimmed()),
            }
            println!("Project code: {}", config.project_code()?);
            println!("Database: {}", config.database_path()?.display());
            println!("Lock timeout: {}s", config.lock_timeout_secs);
        }
        ConfigCommand::Init => {
            let path = Config::resolve_path(cli.config.as_deref())
                .context("No config directory on this platform; pass --config")?;
            config.save(&path)?;
            println!("{} {}", "Config written to".green(), path.display());
        }
    }
    Ok(())
}
