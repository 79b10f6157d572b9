use clap::{Parser, Subcommand};
use std::path::PathBuf;

use roadmap_core::{
    AcStatus, AdrStatus, DocumentType, ExportFormat, IterationStatus, TaskStatus, TrackStatus,
};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Roadmap, track, iteration and ADR planning")]
pub struct Cli {
    /// Path to the config file (defaults to ROADMAP_CONFIG, then the user config dir)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Project code used as the ID prefix (overrides config and ROADMAP_PROJECT_CODE)
    #[clap(long, short = 'p', global = true)]
    pub project: Option<String>,

    /// Database file (overrides config and ROADMAP_DB)
    #[clap(long, global = true)]
    pub db: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Roadmap management commands
    #[clap(subcommand)]
    Roadmap(RoadmapCommand),

    /// Track management and dependency commands
    #[clap(subcommand)]
    Track(TrackCommand),

    /// Task management commands
    #[clap(subcommand)]
    Task(TaskCommand),

    /// Iteration lifecycle and membership commands
    #[clap(subcommand)]
    Iter(IterCommand),

    /// Acceptance criteria commands
    #[clap(subcommand)]
    Ac(AcCommand),

    /// Architecture decision record commands
    #[clap(subcommand)]
    Adr(AdrCommand),

    /// Document commands
    #[clap(subcommand)]
    Doc(DocCommand),

    /// Show entity counts for the project
    Stats,

    /// Export the whole project
    Export {
        /// Output format (json, yaml); guessed from --output when omitted
        #[clap(long, short = 'f')]
        format: Option<ExportFormat>,

        /// Output file path (prints to stdout when omitted)
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Configuration commands
    #[clap(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum RoadmapCommand {
    /// Create a roadmap
    Add {
        /// Roadmap slug (e.g., "platform")
        id: String,

        #[clap(long)]
        title: String,

        #[clap(long, default_value = "")]
        vision: String,
    },

    /// List roadmaps
    List,

    /// Show a roadmap and its tracks
    Show { id: String },

    /// Update a roadmap
    Update {
        id: String,

        #[clap(long)]
        title: Option<String>,

        #[clap(long)]
        vision: Option<String>,
    },

    /// Delete a roadmap without tracks
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum TrackCommand {
    /// Create a track under a roadmap
    Add {
        /// Title of the track
        title: String,

        /// Roadmap the track belongs to
        #[clap(long, short = 'r')]
        roadmap: String,

        #[clap(long, default_value = "")]
        description: String,

        /// Sort key, 1 (highest) to 1000
        #[clap(long, default_value_t = 500)]
        rank: u32,

        /// not-started, in-progress, complete, blocked, waiting
        #[clap(long)]
        status: Option<TrackStatus>,
    },

    /// List tracks
    List {
        #[clap(long, short = 'r')]
        roadmap: Option<String>,

        #[clap(long)]
        status: Option<TrackStatus>,
    },

    /// Show a track with its dependencies and progress
    Show { id: String },

    /// Update a track
    Update {
        id: String,

        #[clap(long)]
        title: Option<String>,

        #[clap(long)]
        description: Option<String>,

        #[clap(long)]
        status: Option<TrackStatus>,

        #[clap(long)]
        rank: Option<u32>,

        /// Move the track to another roadmap
        #[clap(long)]
        roadmap: Option<String>,
    },

    /// Delete a track
    Delete {
        id: String,

        /// Delete even if other tracks depend on it
        #[clap(long)]
        force: bool,
    },

    /// Record that a track depends on another
    Depend {
        /// The dependent track
        id: String,

        /// The track it depends on
        on: String,
    },

    /// Remove a dependency edge
    Undepend { id: String, on: String },

    /// List a track's dependencies and dependents
    Deps { id: String },

    /// Check that no cycle is reachable from a track
    Check { id: String },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Create a task under a track
    Add {
        title: String,

        #[clap(long, short = 't')]
        track: String,

        #[clap(long, default_value = "")]
        description: String,

        #[clap(long, default_value_t = 500)]
        rank: u32,
    },

    /// List tasks
    List {
        #[clap(long, short = 't')]
        track: Option<String>,

        /// todo, in-progress, done
        #[clap(long)]
        status: Option<TaskStatus>,
    },

    /// Show a task and its acceptance criteria
    Show { id: String },

    /// Update a task
    Update {
        id: String,

        #[clap(long)]
        title: Option<String>,

        #[clap(long)]
        description: Option<String>,

        #[clap(long)]
        status: Option<TaskStatus>,

        #[clap(long)]
        rank: Option<u32>,

        /// Move the task to another track
        #[clap(long, short = 't')]
        track: Option<String>,
    },

    /// Delete a task
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum IterCommand {
    /// Create a planned iteration
    Add {
        name: String,

        /// Iteration number (drawn from the sequence when omitted)
        #[clap(long, short = 'n')]
        number: Option<u32>,

        #[clap(long, default_value = "")]
        goal: String,

        #[clap(long, default_value = "")]
        deliverable: String,

        #[clap(long, default_value_t = 500)]
        rank: u32,
    },

    /// List iterations
    List,

    /// Show an iteration with its tasks and progress
    Show { number: u32 },

    /// Update name, goal, deliverable or rank
    Update {
        number: u32,

        #[clap(long)]
        name: Option<String>,

        #[clap(long)]
        goal: Option<String>,

        #[clap(long)]
        deliverable: Option<String>,

        #[clap(long)]
        rank: Option<u32>,
    },

    /// Delete an iteration
    Delete { number: u32 },

    /// planned -> current
    Start { number: u32 },

    /// current -> complete
    Complete { number: u32 },

    /// Move to a status through the lifecycle rules
    Status {
        number: u32,

        /// planned, current, complete
        status: IterationStatus,
    },

    /// Show the current iteration
    Current,

    /// Add a task to an iteration
    AddTask { number: u32, task: String },

    /// Remove a task from an iteration
    RemoveTask { number: u32, task: String },
}

#[derive(Subcommand, Debug)]
pub enum AcCommand {
    /// Add an acceptance criterion to a task
    Add {
        description: String,

        #[clap(long)]
        task: String,
    },

    /// List a task's acceptance criteria
    List {
        #[clap(long)]
        task: String,
    },

    /// Update an acceptance criterion
    Update {
        id: String,

        #[clap(long)]
        description: Option<String>,

        /// pending, verified, failed
        #[clap(long)]
        status: Option<AcStatus>,

        #[clap(long)]
        notes: Option<String>,
    },

    /// Delete an acceptance criterion
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum AdrCommand {
    /// Record a decision for a track
    Add {
        title: String,

        #[clap(long, short = 't')]
        track: String,

        #[clap(long, default_value = "")]
        context: String,

        #[clap(long, default_value = "")]
        decision: String,

        #[clap(long, default_value = "")]
        consequences: String,

        /// proposed, accepted, deprecated
        #[clap(long)]
        status: Option<AdrStatus>,
    },

    /// List ADRs
    List {
        #[clap(long, short = 't')]
        track: Option<String>,
    },

    /// Show an ADR
    Show { id: String },

    /// Update an ADR's text or status
    Update {
        id: String,

        #[clap(long)]
        title: Option<String>,

        #[clap(long)]
        context: Option<String>,

        #[clap(long)]
        decision: Option<String>,

        #[clap(long)]
        consequences: Option<String>,

        #[clap(long)]
        status: Option<AdrStatus>,
    },

    /// Mark an ADR as superseded by another
    Supersede {
        id: String,

        #[clap(long)]
        by: String,
    },

    /// Delete an ADR
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum DocCommand {
    /// Create a document
    Add {
        title: String,

        /// plan, retrospective, reference, other
        #[clap(long = "type", default_value = "other")]
        doc_type: DocumentType,

        #[clap(long, default_value = "")]
        content: String,

        /// Attach to a track
        #[clap(long, conflicts_with = "iteration")]
        track: Option<String>,

        /// Attach to an iteration
        #[clap(long)]
        iteration: Option<u32>,
    },

    /// List documents
    List {
        #[clap(long, conflicts_with_all = ["iteration", "unattached"])]
        track: Option<String>,

        #[clap(long, conflicts_with = "unattached")]
        iteration: Option<u32>,

        /// Only documents attached to nothing
        #[clap(long)]
        unattached: bool,
    },

    /// Show a document
    Show { id: i64 },

    /// Attach a document to a track or an iteration
    Attach {
        id: i64,

        #[clap(long, conflicts_with = "iteration", required_unless_present = "iteration")]
        track: Option<String>,

        #[clap(long)]
        iteration: Option<u32>,
    },

    /// Detach a document
    Detach { id: i64 },

    /// Delete a document
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the resolved configuration
    Show,

    /// Write the resolved configuration to the config file
    Init,
}
