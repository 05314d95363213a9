use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};

use driftscope_core::status::shorten_manager_name;
use driftscope_core::{Condition, CrdInfo, Event, ReadyIcon, ReadyStatus, ReconcileState, Resource};
use driftscope_kubehub::{ClusterAccess, KubeCluster, Selector};
use driftscope_schema::{build_value_tree, crd_schema_tree, flatten_tree, FieldNode, NavStack};
use driftscope_search::{filter_and_sort, match_crds, Matcher, SortKey, SortSpec};
use driftscope_store::{spawn_page_fetch, PageOutcome, Paginator, ResourceList};

mod config;
mod lookup;
mod render;

use config::{Config, Overrides};
use render::{clip, field_label, or_dash, ready_glyph, render_age, render_drift, render_duration, render_time, render_yaml};

#[derive(Parser, Debug)]
#[command(name = "driftctl", version, about = "Inspect custom resources and how their controllers keep up")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Namespace to inspect (default: current context)
    #[arg(short = 'n', long = "namespace", global = true, env = "DRIFTSCOPE_NAMESPACE")]
    namespace: Option<String>,

    /// Inspect all namespaces
    #[arg(short = 'A', long = "all-namespaces", global = true, action = ArgAction::SetTrue)]
    all_namespaces: bool,

    /// Path to a kubeconfig file
    #[arg(long, global = true, env = "DRIFTSCOPE_KUBECONFIG")]
    kubeconfig: Option<String>,

    /// Kubeconfig context
    #[arg(long, global = true, env = "DRIFTSCOPE_CONTEXT")]
    context: Option<String>,

    /// Config file (default: ~/.driftscope.yaml)
    #[arg(long, global = true, env = "DRIFTSCOPE_CONFIG")]
    config: Option<PathBuf>,

    /// Objects requested per list call
    #[arg(long = "page-size", global = true, env = "DRIFTSCOPE_PAGE_SIZE")]
    page_size: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// List served custom resource kinds
    Crds {
        /// Fuzzy filter on name, kind or group
        query: Option<String>,
        /// Count objects per kind (one extra list call each)
        #[arg(long, action = ArgAction::SetTrue)]
        counts: bool,
    },
    /// List namespaces; the one in scope is starred
    Namespaces {
        /// Fuzzy filter on the namespace name
        query: Option<String>,
    },
    /// List objects of a kind with their reconcile state
    Ls {
        /// CRD name (`plural.group`), plural, or kind
        kind: String,
        /// Fuzzy filter on name or namespace
        #[arg(short = 'q', long)]
        query: Option<String>,
        /// name | drift | created | status
        #[arg(long, default_value_t = SortKey::Name)]
        sort: SortKey,
        /// Force descending order (default depends on the key)
        #[arg(long, action = ArgAction::SetTrue, conflicts_with = "asc")]
        desc: bool,
        /// Force ascending order
        #[arg(long, action = ArgAction::SetTrue)]
        asc: bool,
        /// Stop after this many objects
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Count objects of a kind
    Count {
        kind: String,
    },
    /// Controller, conditions and events for one object
    Describe {
        kind: String,
        name: String,
        /// Skip the events lookup
        #[arg(long = "no-events", action = ArgAction::SetTrue)]
        no_events: bool,
    },
    /// Print one object as YAML (JSON with `-o json`)
    Get {
        kind: String,
        name: String,
    },
    /// Browse an object's fields
    Fields {
        kind: String,
        name: String,
        /// Drill to this field first, e.g. `spec.rules[0]`
        #[arg(long)]
        path: Option<String>,
        /// Print every nested field with its full path
        #[arg(long, action = ArgAction::SetTrue)]
        flat: bool,
    },
    /// Browse the OpenAPI schema of a kind
    Schema {
        kind: String,
        /// Drill to this field first, e.g. `spec.rules`
        #[arg(long)]
        path: Option<String>,
        #[arg(long, action = ArgAction::SetTrue)]
        flat: bool,
    },
}

fn init_tracing() {
    let env = std::env::var("DRIFTSCOPE_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("DRIFTSCOPE_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid DRIFTSCOPE_METRICS_ADDR; expected host:port");
        }
    }
}

/// Everything a subcommand needs once the cluster is reachable.
struct Session {
    cfg: Config,
    cluster: Arc<KubeCluster>,
    paginator: Arc<Paginator<KubeCluster>>,
    output: Output,
    now: DateTime<Utc>,
}

impl Session {
    async fn connect(cfg: Config, output: Output) -> Result<Self> {
        let client = driftscope_kubehub::connect(cfg.kubeconfig.as_deref(), cfg.context.as_deref())
            .await
            .context("connecting to cluster")?;
        let cluster = Arc::new(KubeCluster::new(client));
        let paginator = Arc::new(Paginator::new(Arc::clone(&cluster)));
        Ok(Self { cfg, cluster, paginator, output, now: Utc::now() })
    }

    fn scope(&self) -> Option<String> { self.cfg.scope(self.cluster.default_namespace()) }

    async fn crds(&self) -> Result<Vec<CrdInfo>> {
        self.cluster.discover_crds().await.context("discovering custom resource kinds")
    }

    async fn selector(&self, kind: &str) -> Result<Selector> {
        let crds = self.crds().await?;
        let crd = lookup::resolve_crd(&crds, kind)?;
        Ok(Selector::for_crd(crd, self.scope().as_deref()))
    }

    fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

#[derive(Serialize)]
struct CrdRow<'a> {
    #[serde(flatten)]
    crd: &'a CrdInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
}

#[derive(Serialize)]
struct ResourceRow {
    namespace: Option<String>,
    name: String,
    kind: String,
    ready: ReadyStatus,
    icon: ReadyIcon,
    state: ReconcileState,
    generation: i64,
    observed_generation: i64,
    drift: i64,
    controller: String,
    created_at: Option<DateTime<Utc>>,
    lag_secs: i64,
    silence_secs: i64,
}

impl ResourceRow {
    fn new(r: &Resource, s: &Session) -> Self {
        Self {
            namespace: r.namespace.clone(),
            name: r.name.clone(),
            kind: r.kind.clone(),
            ready: r.ready_status(),
            icon: r.ready_icon(),
            state: r.reconcile_state(s.now, s.cfg.stuck_after()),
            generation: r.generation,
            observed_generation: r.observed_generation,
            drift: r.drift(),
            controller: r.controller_manager.clone(),
            created_at: r.created_at,
            lag_secs: r.lag(s.now).num_seconds(),
            silence_secs: r.silence(s.now).num_seconds(),
        }
    }
}

#[derive(Serialize)]
struct Describe<'a> {
    #[serde(flatten)]
    row: ResourceRow,
    uid: &'a str,
    last_status_write: Option<DateTime<Utc>>,
    last_spec_write: Option<DateTime<Utc>>,
    conditions: &'a [Condition],
    events: &'a [Event],
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    let mut cfg = Config::load(cli.config.as_deref());
    cfg.apply(Overrides {
        kubeconfig: cli.kubeconfig.clone(),
        context: cli.context.clone(),
        namespace: cli.namespace.clone(),
        all_namespaces: cli.all_namespaces,
        page_size: cli.page_size,
        counts: matches!(cli.command, Commands::Crds { counts: true, .. }),
    });
    let session = Session::connect(cfg, cli.output).await?;

    match cli.command {
        Commands::Crds { query, .. } => cmd_crds(&session, query.as_deref().unwrap_or("")).await,
        Commands::Namespaces { query } => cmd_namespaces(&session, query.as_deref().unwrap_or("")).await,
        Commands::Ls { kind, query, sort, desc, asc, limit } => {
            let ascending = if desc { false } else if asc { true } else { sort.natural_ascending() };
            cmd_ls(&session, &kind, query.as_deref().unwrap_or(""), SortSpec { key: sort, ascending }, limit).await
        }
        Commands::Count { kind } => cmd_count(&session, &kind).await,
        Commands::Describe { kind, name, no_events } => cmd_describe(&session, &kind, &name, !no_events).await,
        Commands::Get { kind, name } => cmd_get(&session, &kind, &name).await,
        Commands::Fields { kind, name, path, flat } => cmd_fields(&session, &kind, &name, path.as_deref(), flat).await,
        Commands::Schema { kind, path, flat } => cmd_schema(&session, &kind, path.as_deref(), flat).await,
    }
}

async fn cmd_crds(s: &Session, query: &str) -> Result<()> {
    let crds = s.crds().await?;
    let matched = match_crds(query, &crds);
    info!(total = crds.len(), matched = matched.len(), "crds");
    let scope = s.scope();
    let mut rows = Vec::with_capacity(matched.len());
    for crd in matched {
        let count = if s.cfg.disable_counts {
            None
        } else {
            let sel = Selector::for_crd(crd, scope.as_deref());
            match s.paginator.count_resources(&sel).await {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!(crd = %crd.name, error = %e, "count failed");
                    None
                }
            }
        };
        rows.push(CrdRow { crd, count });
    }
    match s.output {
        Output::Json => s.print_json(&rows)?,
        Output::Human => {
            println!("{:<48} {:<28} {:<10} {:<10} {}", "NAME", "KIND", "VERSION", "SCOPE", "COUNT");
            for r in rows {
                let count = r.count.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string());
                println!("{:<48} {:<28} {:<10} {:<10} {}", clip(&r.crd.name, 48), r.crd.kind, r.crd.version, r.crd.scope(), count);
            }
        }
    }
    Ok(())
}

async fn cmd_namespaces(s: &Session, query: &str) -> Result<()> {
    let all = s.cluster.list_namespaces().await.context("listing namespaces")?;
    let matcher = Matcher::default();
    let names: Vec<&String> = all.iter().filter(|n| matcher.is_match(query, n)).collect();
    info!(total = all.len(), matched = names.len(), "namespaces");
    match s.output {
        Output::Json => s.print_json(&names)?,
        Output::Human => {
            let scope = s.scope();
            for n in names {
                let mark = if scope.as_deref() == Some(n.as_str()) { "*" } else { " " };
                println!("{} {}", mark, n);
            }
        }
    }
    Ok(())
}

/// Page through a list the way an interactive view does: one fetch in
/// flight, each applied as it lands. Ctrl-C stops with what has loaded.
async fn load_list(s: &Session, selector: Selector, limit: Option<usize>) -> Result<ResourceList> {
    let mut list = ResourceList::new(selector, s.cfg.page_size);
    let (tx, mut rx) = mpsc::channel::<PageOutcome>(1);
    let mut next = list.refresh();
    while let Some(req) = next.take() {
        let handle = spawn_page_fetch(Arc::clone(&s.paginator), req, tx.clone());
        let outcome = tokio::select! {
            o = rx.recv() => o,
            _ = signal::ctrl_c() => {
                handle.abort();
                list.close();
                warn!(loaded = list.len(), "interrupted; showing partial list");
                break;
            }
        };
        let Some(outcome) = outcome else { break };
        list.apply(outcome.ticket, outcome.result);
        if let Some(e) = list.error() {
            bail!("listing {}: {}", list.selector(), e);
        }
        if limit.is_some_and(|l| list.len() >= l) {
            break;
        }
        next = list.request_more();
    }
    if let Some(e) = list.continuation_error() {
        warn!(error = e, loaded = list.len(), "listing stopped early");
    }
    Ok(list)
}

async fn cmd_ls(s: &Session, kind: &str, query: &str, sort: SortSpec, limit: Option<usize>) -> Result<()> {
    let selector = s.selector(kind).await?;
    info!(selector = %selector, query, sort = %sort.key, "ls");
    let list = load_list(s, selector, limit).await?;
    let mut shown = filter_and_sort(query, list.items(), sort);
    if let Some(l) = limit {
        shown.truncate(l);
    }
    match s.output {
        Output::Json => {
            let rows: Vec<ResourceRow> = shown.iter().map(|r| ResourceRow::new(r, s)).collect();
            s.print_json(&rows)?;
        }
        Output::Human => {
            println!(
                "{:<2} {:<16} {:<40} {:<12} {:<6} {:<9} {:<16} {:<7} {}",
                "", "NAMESPACE", "NAME", "STATUS", "DRIFT", "STATE", "CONTROLLER", "LAG", "AGE"
            );
            for r in shown {
                println!(
                    "{:<2} {:<16} {:<40} {:<12} {:<6} {:<9} {:<16} {:<7} {}",
                    ready_glyph(r.ready_icon()),
                    clip(or_dash(r.namespace_or_empty()), 16),
                    clip(&r.name, 40),
                    r.ready_status().as_str(),
                    render_drift(r),
                    r.reconcile_state(s.now, s.cfg.stuck_after()).as_str(),
                    shorten_manager_name(&r.controller_manager),
                    render_duration(r.lag(s.now)),
                    render_age(r.created_at, s.now),
                );
            }
            if list.has_more() {
                eprintln!("(more objects available; raise --limit to see them)");
            }
        }
    }
    Ok(())
}

async fn cmd_count(s: &Session, kind: &str) -> Result<()> {
    let selector = s.selector(kind).await?;
    let n = s.paginator.count_resources(&selector).await?;
    match s.output {
        Output::Json => s.print_json(&serde_json::json!({"selector": selector.to_string(), "count": n}))?,
        Output::Human => println!("{}", n),
    }
    Ok(())
}

async fn cmd_describe(s: &Session, kind: &str, name: &str, with_events: bool) -> Result<()> {
    let selector = s.selector(kind).await?;
    let r = s.paginator.get(&selector, name).await?;
    let events = if with_events {
        s.paginator.events(&r).await.unwrap_or_else(|e| {
            warn!(error = %e, "events unavailable");
            Vec::new()
        })
    } else {
        Vec::new()
    };
    let out = Describe {
        row: ResourceRow::new(&r, s),
        uid: &r.uid,
        last_status_write: r.last_status_write,
        last_spec_write: r.last_spec_write,
        conditions: &r.conditions,
        events: &events,
    };
    if s.output == Output::Json {
        return s.print_json(&out);
    }
    println!("Name:          {}", r.name);
    println!("Namespace:     {}", or_dash(r.namespace_or_empty()));
    println!("Kind:          {} ({})", r.kind, r.gvr);
    println!("Age:           {}", render_age(r.created_at, s.now));
    println!("Status:        {} {}", ready_glyph(out.row.icon), out.row.ready);
    println!("State:         {}", out.row.state);
    println!("Generation:    {} (observed {}, drift {})", r.generation, r.observed_generation, render_drift(&r));
    println!("Controller:    {}", or_dash(&r.controller_manager));
    println!("Spec write:    {}", render_time(r.last_spec_write));
    println!("Status write:  {}", render_time(r.last_status_write));
    println!("Lag:           {}", render_duration(r.lag(s.now)));
    println!("Silence:       {}", render_duration(r.silence(s.now)));
    println!();
    println!("Conditions:");
    if r.conditions.is_empty() {
        println!("  (none)");
    }
    for c in &r.conditions {
        println!(
            "  {:<14} {:<8} {:<24} {:<19} {}",
            or_dash(&c.type_),
            or_dash(&c.status),
            clip(or_dash(&c.reason), 24),
            render_time(c.last_transition_time),
            c.message
        );
    }
    if with_events {
        println!();
        println!("Events:");
        if events.is_empty() {
            println!("  (none)");
        }
        for e in &events {
            println!("  {:<19} {:<8} {:<24} x{:<4} {}", render_time(e.last_timestamp), e.type_, clip(&e.reason, 24), e.count, e.message);
        }
    }
    Ok(())
}

async fn cmd_get(s: &Session, kind: &str, name: &str) -> Result<()> {
    let selector = s.selector(kind).await?;
    let r = s.paginator.get(&selector, name).await?;
    match s.output {
        Output::Json => s.print_json(&*r.raw),
        Output::Human => {
            print!("{}", render_yaml(&r.raw).context("encoding object as YAML")?);
            Ok(())
        }
    }
}

async fn cmd_fields(s: &Session, kind: &str, name: &str, path: Option<&str>, flat: bool) -> Result<()> {
    let selector = s.selector(kind).await?;
    let r = s.paginator.get(&selector, name).await?;
    let nav = NavStack::new(build_value_tree(&r.raw), r.key());
    browse(s, nav, path, flat, false)
}

async fn cmd_schema(s: &Session, kind: &str, path: Option<&str>, flat: bool) -> Result<()> {
    let crds = s.crds().await?;
    let crd = lookup::resolve_crd(&crds, kind)?;
    let doc = s.paginator.crd_document(&crd.name).await?;
    let Some(tree) = crd_schema_tree(&doc) else {
        bail!("{} has no served version with a schema", crd.name);
    };
    info!(crd = %crd.name, version = %tree.version, fields = tree.fields.len(), "schema");
    let nav = NavStack::new(tree.fields, format!("{}/{}", crd.kind, tree.version));
    browse(s, nav, path, flat, true)
}

fn browse(s: &Session, mut nav: NavStack<FieldNode>, path: Option<&str>, flat: bool, schema: bool) -> Result<()> {
    let segments = path.map(lookup::field_path_segments).unwrap_or_default();
    let steps = nav.drill_path(&segments);
    let nodes: Vec<&FieldNode> = if steps == segments.len() {
        if flat { flatten_tree(nav.current()) } else { nav.current().iter().collect() }
    } else {
        // The last segment may name a leaf: drill_path leaves the cursor on it.
        let leaf = nav.selected().filter(|n| steps + 1 == segments.len() && n.name == segments[steps]);
        match leaf {
            Some(n) => vec![n],
            None => bail!("no field {:?} under {}", segments[steps], nav.breadcrumb()),
        }
    };
    if s.output == Output::Json {
        return s.print_json(&nodes);
    }
    println!("{}", nav.breadcrumbs().join(" › "));
    if schema {
        println!("{:<40} {:<20} {:<8} {}", "FIELD", "TYPE", "REQUIRED", "DESCRIPTION");
        for n in nodes {
            let label = if flat { n.path.clone() } else { field_label(n) };
            let required = if n.required { "yes" } else { "no" };
            let desc = n.value.lines().next().unwrap_or("");
            println!("{:<40} {:<20} {:<8} {}", label, n.type_label, required, clip(desc, 80));
        }
    } else {
        println!("{:<40} {:<10} {}", "FIELD", "TYPE", "VALUE");
        for n in nodes {
            let label = if flat { n.path.clone() } else { field_label(n) };
            println!("{:<40} {:<10} {}", label, n.type_label, clip(&n.value, 80));
        }
    }
    Ok(())
}
