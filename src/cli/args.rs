//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Resolve project config as if started in that directory
//! - `--config <path>`: Use this global config file
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::types::Category;

/// sonatakit - Curate SONATA circuit containers and reindex morphologies
#[derive(Parser, Debug)]
#[command(name = "sonatakit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Resolve project config as if sonatakit was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Global config file (overrides $SONATAKIT_CONFIG and default locations)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Container category as a CLI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    Nodes,
    Edges,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Nodes => Category::Nodes,
            CategoryArg::Edges => Category::Edges,
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    // ========== Populations ==========
    /// List the populations of a node or edge container
    #[command(name = "population-names")]
    PopulationNames {
        /// Node or edge container
        file: PathBuf,
    },

    /// Rename a population in place
    #[command(
        name = "rename-population",
        long_about = "Rename a population in place.\n\n\
            When the container holds a single population the old name may be \
            omitted. The file is rewritten atomically, so a failed rename leaves \
            it untouched.",
        after_help = "\
EXAMPLES:
    # Rename the only population
    sonatakit rename-population nodes.json hippocampus_neurons

    # Pick one of several populations
    sonatakit rename-population nodes.json CA1 --old-name default"
    )]
    RenamePopulation {
        /// Node or edge container
        file: PathBuf,

        /// New population name
        new_name: String,

        /// Population to rename (required when there are several)
        #[arg(long)]
        old_name: Option<String>,
    },

    /// Write an attribute column into a population group
    #[command(
        name = "set-attribute",
        long_about = "Write an attribute column into a population group.\n\n\
            A single --value is broadcast to every row of the group; repeat \
            --value to give one value per row. Text values are stored with a \
            @library dictionary. Numeric values are stored raw.",
        after_help = "\
EXAMPLES:
    # Mark every node as biophysical
    sonatakit set-attribute nodes.json --name model_type --value biophysical

    # Replace a numeric column
    sonatakit set-attribute edges.json --name delay --value 0.5 --overwrite"
    )]
    SetAttribute {
        /// Node or edge container
        file: PathBuf,

        /// Attribute name
        #[arg(long)]
        name: String,

        /// Value(s); one value is broadcast
        #[arg(long = "value", required = true, allow_hyphen_values = true)]
        values: Vec<String>,

        /// Population (required when there are several)
        #[arg(long)]
        population: Option<String>,

        /// Attribute group id
        #[arg(long, default_value = "0")]
        group: String,

        /// Replace an existing attribute
        #[arg(long)]
        overwrite: bool,
    },

    /// Backfill a missing node_type_id/edge_type_id column with -1
    #[command(name = "add-type-id")]
    AddTypeId {
        /// Node or edge container
        file: PathBuf,

        /// Population (required when there are several)
        #[arg(long)]
        population: Option<String>,
    },

    // ========== Curation ==========
    /// Name an edge population after the node populations it connects
    #[command(
        name = "rewire-edges",
        long_about = "Name an edge population after the node populations it connects.\n\n\
            The sole edge population becomes <source>__<target>__<type> and its \
            source_node_id/target_node_id columns are annotated with the node \
            population names.",
        after_help = "\
EXAMPLES:
    sonatakit rewire-edges edges.json --source-nodes nodes.json --target-nodes nodes.json"
    )]
    RewireEdges {
        /// Edge container
        edges: PathBuf,

        /// Node container of the edge sources
        #[arg(long)]
        source_nodes: PathBuf,

        /// Node container of the edge targets
        #[arg(long)]
        target_nodes: PathBuf,

        /// Edge type label (defaults to config edge_type_label)
        #[arg(long)]
        type_label: Option<String>,
    },

    /// Create a virtual node population for projection sources
    #[command(name = "projection-source-nodes")]
    ProjectionSourceNodes {
        /// Edge container of the projection
        edges: PathBuf,

        /// Output directory
        #[arg(long, short)]
        output: PathBuf,

        /// Name of the new node population (defaults to config default_population)
        #[arg(long)]
        population: Option<String>,

        /// Size to the distinct source ids; ids still need correct-offset
        #[arg(long)]
        fix_offset: bool,
    },

    /// Shift source node ids down by an offset, dropping negative ids
    #[command(name = "correct-offset")]
    CorrectOffset {
        /// Edge container
        edges: PathBuf,

        /// Amount subtracted from every source_node_id
        #[arg(long, allow_hyphen_values = true)]
        offset: i64,

        /// Population (required when there are several)
        #[arg(long)]
        population: Option<String>,
    },

    /// Merge the populations of several containers into a new one
    #[command(name = "merge")]
    Merge {
        /// Category of every input
        #[arg(long, value_enum)]
        category: CategoryArg,

        /// Output container (must not exist)
        #[arg(long, short)]
        output: PathBuf,

        /// Input containers
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Split a node population by attribute value
    #[command(
        name = "split-population",
        after_help = "\
EXAMPLES:
    # One node file per region, one edge file per region pair
    sonatakit split-population --attribute region --nodes nodes.json \\
        --edges edges.json --output split/"
    )]
    SplitPopulation {
        /// Output directory
        #[arg(long, short)]
        output: PathBuf,

        /// Group-0 attribute to split on
        #[arg(long)]
        attribute: String,

        /// Node container
        #[arg(long)]
        nodes: PathBuf,

        /// Edge container
        #[arg(long)]
        edges: PathBuf,
    },

    // ========== Morphologies ==========
    /// Check morphologies for ordering and unifurcations
    #[command(
        name = "check-morphologies",
        long_about = "Check morphologies for section ordering and unifurcations.\n\n\
            Every morphology is checked independently. Exits with status 1 if any \
            morphology has incorrect ordering, has unifurcations, or cannot be read.",
        after_help = "\
EXAMPLES:
    # Check every morphology in a directory
    sonatakit check-morphologies --morphs morphologies/

    # Check the morphologies named in a database
    sonatakit check-morphologies --morphs morphologies/ --morphdb neurondb.dat"
    )]
    CheckMorphologies {
        /// Morphology directory
        #[arg(long)]
        morphs: PathBuf,

        /// Morphology database (defaults to config [check] morphdb, then the directory listing)
        #[arg(long)]
        morphdb: Option<PathBuf>,
    },

    /// Remove unifurcations, writing new morphologies and an update record
    #[command(
        name = "update-morphologies",
        long_about = "Remove unifurcations from every morphology of a directory.\n\n\
            Morphologies are written to a new output directory together with \
            morph_updates.json, which update-edge-population uses to remap \
            synapse references. Inputs are never modified."
    )]
    UpdateMorphologies {
        /// Morphology directory
        #[arg(long)]
        morphs: PathBuf,

        /// Output directory (must not exist)
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Remap synapse section/segment references using an update record
    #[command(name = "update-edge-population")]
    UpdateEdgePopulation {
        /// morph_updates.json written by update-morphologies
        #[arg(long)]
        updates: PathBuf,

        /// Node container with the morphology attribute
        #[arg(long)]
        nodes: PathBuf,

        /// Edge population to update
        #[arg(long)]
        population: String,

        /// Edge containers
        #[arg(long = "edges", required = true)]
        edges: Vec<PathBuf>,
    },

    /// Write afferent/efferent section positions
    #[command(name = "update-edge-pos")]
    UpdateEdgePos {
        /// Morphology directory
        #[arg(long)]
        morphs: PathBuf,

        /// Node container with the morphology attribute
        #[arg(long)]
        nodes: PathBuf,

        /// Edge population to update
        #[arg(long)]
        population: String,

        /// Edge containers
        #[arg(long = "edges", required = true)]
        edges: Vec<PathBuf>,
    },

    // ========== Configuration ==========
    /// Get, set, or list configuration values
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Set a project configuration value
    Set {
        /// Configuration key
        key: String,
        /// Value to set
        value: String,
    },
    /// List all configuration values
    List,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn negative_offset_parses() {
        let cli = Cli::try_parse_from(["sonatakit", "correct-offset", "e.json", "--offset", "-3"])
            .unwrap();
        assert!(matches!(cli.command, Command::CorrectOffset { offset: -3, .. }));
    }

    #[test]
    fn repeated_values_collected() {
        let cli = Cli::try_parse_from([
            "sonatakit",
            "set-attribute",
            "n.json",
            "--name",
            "x",
            "--value",
            "1",
            "--value",
            "2",
        ])
        .unwrap();
        match cli.command {
            Command::SetAttribute { values, group, .. } => {
                assert_eq!(values, vec!["1", "2"]);
                assert_eq!(group, "0");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
