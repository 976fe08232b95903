use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, Subcommand};
use cstml_editor_core::{
    EditEngine, EditOutcome, InteractionState, Node, OpenTag, RenderOptions, Rendered, Renderer,
    SelectionRange, SelectionState, SourcePrinter, Tag, tree_from_stream,
};
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::Serialize;

#[derive(Parser)]
#[command(version, about = "cstml - structural editing over CST tag streams", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Render options as JSON
    #[arg(long, global = true, env = "CSTML_CONFIG")]
    config: Option<PathBuf>,

    /// Out-of-band expressions: a JSON array of tag streams, one per gap
    #[arg(long, global = true)]
    expressions: Option<PathBuf>,

    /// Print edit results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a tag stream to HTML
    Render {
        /// Tag stream as JSON
        tags: PathBuf,

        /// Visual ids to select: one for a single node, two for a range
        #[arg(long, num_args = 1..=2)]
        select: Vec<String>,

        /// Render the selection as being edited
        #[arg(long)]
        editing: bool,
    },
    /// Replace a node with literal text
    Set {
        tags: PathBuf,

        /// Visual id of the node to replace
        #[arg(long)]
        target: String,

        #[arg(long)]
        text: String,

        /// Node type for the new token when the target is not a token
        #[arg(long = "type", default_value = "Literal")]
        node_type: String,
    },
    /// Move a node into another node's slot, leaving a gap behind
    Move {
        tags: PathBuf,

        #[arg(long)]
        source: String,

        #[arg(long)]
        dest: String,
    },
}

#[derive(Serialize)]
struct EditReport {
    source: String,
    expressions: Vec<Vec<Tag>>,
}

fn main() -> Result<()> {
    init_miette();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let options = match &cli.config {
        Some(path) => read_json::<RenderOptions>(path)?,
        None => RenderOptions::default(),
    };
    let expressions = match &cli.expressions {
        Some(path) => load_expressions(path)?,
        None => Vec::new(),
    };

    match cli.command {
        Commands::Render {
            tags,
            select,
            editing,
        } => {
            let rendered = load(&tags, &expressions, &options)?;
            let rendered = match select.as_slice() {
                [] => rendered,
                [id] => reselect(&rendered, &options, SelectionRange::single(id.as_str()), editing)?,
                [start, end, ..] => reselect(
                    &rendered,
                    &options,
                    SelectionRange::new(start.as_str(), end.as_str()),
                    editing,
                )?,
            };
            println!("{}", rendered.to_html());
        }
        Commands::Set {
            tags,
            target,
            text,
            node_type,
        } => {
            let rendered = load(&tags, &expressions, &options)?;
            let node = lookup(&rendered, &target)?;
            let value = match node.is_token().then(|| node.with_text(text.as_str())).flatten() {
                Some(value) => value,
                None => Node::token(OpenTag::token(node_type), text),
            };
            let printer = SourcePrinter::new();
            let outcome = EditEngine::new(&rendered.bindings, &printer).set(node.id(), value)?;
            report(outcome, cli.json)?;
        }
        Commands::Move { tags, source, dest } => {
            let rendered = load(&tags, &expressions, &options)?;
            let source = lookup(&rendered, &source)?;
            let dest = lookup(&rendered, &dest)?;
            let printer = SourcePrinter::new();
            let outcome =
                EditEngine::new(&rendered.bindings, &printer).move_node(source.id(), dest.id())?;
            report(outcome, cli.json)?;
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text)
        .into_diagnostic()
        .wrap_err_with(|| format!("parsing {}", path.display()))
}

fn load_expressions(path: &Path) -> Result<Vec<Rc<Node>>> {
    let streams: Vec<Vec<Tag>> = read_json(path)?;
    let mut nodes = Vec::with_capacity(streams.len());
    for stream in &streams {
        nodes.push(tree_from_stream(stream, &[])?);
    }
    Ok(nodes)
}

fn load(tags: &Path, expressions: &[Rc<Node>], options: &RenderOptions) -> Result<Rendered> {
    let tags: Vec<Tag> = read_json(tags)?;
    let tree = tree_from_stream(&tags, expressions)?;
    Ok(Renderer::new(options).render(&tree)?)
}

fn reselect(
    rendered: &Rendered,
    options: &RenderOptions,
    range: SelectionRange,
    editing: bool,
) -> Result<Rendered> {
    let root = range.resolve(&rendered.bindings);
    if root.is_none() {
        tracing::warn!(?range, "selection does not resolve to a node");
    }
    let state = InteractionState {
        selection_root: root.map(|node| node.id()),
        selected_range: range,
        editing,
        selection_state: SelectionState::Selected,
        drag_target: None,
    };
    let tree = rendered
        .bindings
        .root()
        .cloned()
        .ok_or_else(|| miette::miette!("nothing was rendered"))?;
    Ok(Renderer::new(options)
        .with_previous(rendered)
        .with_state(&state)
        .render(&tree)?)
}

fn lookup(rendered: &Rendered, visual: &str) -> Result<Rc<Node>> {
    rendered
        .bindings
        .node_for_visual(visual)
        .cloned()
        .ok_or_else(|| miette::miette!("no node is rendered as `{visual}`"))
}

fn report(outcome: EditOutcome, json: bool) -> Result<()> {
    if !json {
        println!("{}", outcome.source);
        return Ok(());
    }
    let report = EditReport {
        expressions: expression_streams(&outcome.expressions)?,
        source: outcome.source,
    };
    let text = serde_json::to_string_pretty(&report).into_diagnostic()?;
    println!("{text}");
    Ok(())
}

/// Expressions as tag streams, the same form `--expressions` reads.
///
/// An expression holding another out-of-band value has no such form, since
/// the inner value would stream as an embedded node.
fn expression_streams(expressions: &[Rc<Node>]) -> Result<Vec<Vec<Tag>>> {
    expressions
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let stream: Vec<Tag> = node.stream().collect();
            if stream.iter().any(|tag| matches!(tag, Tag::Embedded(_))) {
                return Err(miette::miette!(
                    "expression {index} contains another expression and cannot be printed as a tag stream"
                ));
            }
            Ok(stream)
        })
        .collect()
}

fn init_miette() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))
    .expect("couldn't set the miette hook");
    miette::set_panic_hook();
}
