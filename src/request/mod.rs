//! Request building
//!
//! Turns positional resource arguments plus the `--to`/`--from` family of
//! flags into typed metric requests. Every option combination is validated
//! before the cluster is contacted; whole-kind targets are then expanded
//! into one request per listed object.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{MeshError, Result};
use crate::kube::ClusterState;
use crate::models::{ResourceKind, ResourceRef};

/// Batch output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Wide,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Table => "table",
            OutputFormat::Wide => "wide",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "table" => Ok(OutputFormat::Table),
            "wide" => Ok(OutputFormat::Wide),
            "json" => Ok(OutputFormat::Json),
            other => Err(MeshError::InvalidArgument(format!(
                "--output supports table, wide and json (got \"{}\")",
                other
            ))),
        }
    }
}

/// What a batch request asks the metrics backend for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestKind {
    #[default]
    Stats,
    Edges,
    Routes,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Stats => "stats",
            RequestKind::Edges => "edges",
            RequestKind::Routes => "routes",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Restricts traffic to one peer of the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrafficFilter {
    /// Only traffic sent by the target to this resource
    To(ResourceRef),
    /// Only traffic received by the target from this resource
    From(ResourceRef),
}

/// Command-line query options, one value per invocation
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub request_kind: RequestKind,
    pub namespace: String,
    pub all_namespaces: bool,
    pub to_resource: Option<String>,
    pub to_namespace: Option<String>,
    pub from_resource: Option<String>,
    pub from_namespace: Option<String>,
    pub time_window: String,
    pub output: String,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            request_kind: RequestKind::Stats,
            namespace: "default".to_string(),
            all_namespaces: false,
            to_resource: None,
            to_namespace: None,
            from_resource: None,
            from_namespace: None,
            time_window: "1m".to_string(),
            output: OutputFormat::Table.to_string(),
        }
    }
}

/// One request against the metrics backend
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRequest {
    pub target: ResourceRef,
    pub filter: Option<TrafficFilter>,
    pub time_window: String,
    pub kind: RequestKind,
    pub all_namespaces: bool,
}

/// Live tap stream filters
#[derive(Debug, Clone, PartialEq)]
pub struct TapOptions {
    /// Maximum requests per second to tap
    pub max_rps: f64,
    pub method: Option<String>,
    pub path_prefix: Option<String>,
    pub authority: Option<String>,
}

impl Default for TapOptions {
    fn default() -> Self {
        Self {
            max_rps: 100.0,
            method: None,
            path_prefix: None,
            authority: None,
        }
    }
}

/// A live tap subscription
#[derive(Debug, Clone, PartialEq)]
pub struct TapRequest {
    pub target: ResourceRef,
    pub to: Option<ResourceRef>,
    pub max_rps: f64,
    pub method: Option<String>,
    pub path_prefix: Option<String>,
    pub authority: Option<String>,
}

/// Parse a time window such as `30s`, `1m` or `2h`
pub fn parse_time_window(window: &str) -> Result<Duration> {
    let invalid = || {
        MeshError::InvalidArgument(format!(
            "time window \"{}\" must be a number followed by s, m or h",
            window
        ))
    };

    let unit_at = window.len().checked_sub(1).ok_or_else(invalid)?;
    if !window.is_char_boundary(unit_at) {
        return Err(invalid());
    }
    let (digits, unit) = window.split_at(unit_at);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let value: u64 = digits.parse().map_err(|_| invalid())?;

    let secs = match unit {
        "s" => value,
        "m" => value.saturating_mul(60),
        "h" => value.saturating_mul(3600),
        _ => return Err(invalid()),
    };
    Ok(Duration::from_secs(secs))
}

/// Build batch requests for the given positional arguments
///
/// Validation runs to completion before the cluster is touched, so a
/// rejected invocation never issues a single API call.
pub async fn build_requests<C>(
    cluster: &C,
    args: &[String],
    opts: &QueryOptions,
) -> Result<Vec<MetricRequest>>
where
    C: ClusterState + ?Sized,
{
    let targets = validate(args, opts)?;
    let filter = parse_filter(opts)?;

    let mut requests = Vec::with_capacity(targets.len());
    for target in targets {
        if target.is_whole_kind() && target.kind.is_listable() {
            let expanded = expand_whole_kind(cluster, &target, opts.all_namespaces).await?;
            tracing::debug!("Expanded {} into {} target(s)", target, expanded.len());
            requests.extend(
                expanded
                    .into_iter()
                    .map(|target| request_for(target, &filter, opts)),
            );
        } else {
            requests.push(request_for(target, &filter, opts));
        }
    }

    Ok(requests)
}

/// Build the subscription for `top`
pub fn build_tap_request(
    args: &[String],
    opts: &QueryOptions,
    tap: &TapOptions,
) -> Result<TapRequest> {
    if opts.from_resource.is_some() {
        return Err(MeshError::ConflictingOptions(
            "--from is not supported for live traffic; tap the source resource instead"
                .to_string(),
        ));
    }
    if tap.max_rps.is_nan() || tap.max_rps <= 0.0 {
        return Err(MeshError::InvalidArgument(format!(
            "--max-rps must be greater than zero (got {})",
            tap.max_rps
        )));
    }

    let mut targets = ResourceRef::parse_args(&opts.namespace, args)?;
    if targets.len() != 1 {
        return Err(MeshError::InvalidArgument(format!(
            "exactly one resource may be tapped (got {})",
            targets.len()
        )));
    }
    let target = targets.remove(0);
    if target.kind == ResourceKind::All {
        return Err(MeshError::unsupported(target.kind, "live traffic"));
    }
    if opts.to_namespace.is_some() {
        if target.kind == ResourceKind::Namespace {
            return Err(MeshError::ConflictingOptions(
                "--to-namespace cannot be used with a namespace target".to_string(),
            ));
        }
        if opts.to_resource.is_none() {
            return Err(MeshError::ConflictingOptions(
                "--to-namespace requires --to".to_string(),
            ));
        }
    }

    let to = match &opts.to_resource {
        Some(to) => Some(ResourceRef::parse(
            opts.to_namespace.as_deref().unwrap_or(&opts.namespace),
            to,
        )?),
        None => None,
    };

    Ok(TapRequest {
        target,
        to,
        max_rps: tap.max_rps,
        method: tap.method.clone(),
        path_prefix: tap.path_prefix.clone(),
        authority: tap.authority.clone(),
    })
}

fn validate(args: &[String], opts: &QueryOptions) -> Result<Vec<ResourceRef>> {
    opts.output.parse::<OutputFormat>()?;
    parse_time_window(&opts.time_window)?;

    let has_to = opts.to_resource.is_some() || opts.to_namespace.is_some();
    let has_from = opts.from_resource.is_some() || opts.from_namespace.is_some();
    if has_to && has_from {
        return Err(MeshError::ConflictingOptions(
            "--to and --from flags are mutually exclusive".to_string(),
        ));
    }
    if opts.request_kind == RequestKind::Edges && (has_to || has_from) {
        return Err(MeshError::ConflictingOptions(
            "--to and --from cannot be used with edges".to_string(),
        ));
    }

    let targets = ResourceRef::parse_args(&opts.namespace, args)?;

    for target in &targets {
        if opts.all_namespaces && !target.is_whole_kind() {
            return Err(MeshError::ConflictingOptions(format!(
                "--all-namespaces cannot be combined with a named resource ({})",
                target
            )));
        }

        if target.kind == ResourceKind::Namespace
            && (opts.to_namespace.is_some() || opts.from_namespace.is_some())
        {
            return Err(MeshError::ConflictingOptions(
                "--to-namespace and --from-namespace cannot be used with a namespace target"
                    .to_string(),
            ));
        }

        match (opts.request_kind, target.kind) {
            (
                RequestKind::Edges,
                ResourceKind::Service | ResourceKind::Authority | ResourceKind::All,
            ) => return Err(MeshError::unsupported(target.kind, "edges")),
            (RequestKind::Routes, ResourceKind::Authority | ResourceKind::All) => {
                return Err(MeshError::unsupported(target.kind, "routes"));
            }
            _ => {}
        }
    }

    Ok(targets)
}

fn parse_filter(opts: &QueryOptions) -> Result<Option<TrafficFilter>> {
    if let Some(to) = &opts.to_resource {
        let ns = opts.to_namespace.as_deref().unwrap_or(&opts.namespace);
        return Ok(Some(TrafficFilter::To(ResourceRef::parse(ns, to)?)));
    }
    if let Some(from) = &opts.from_resource {
        let ns = opts.from_namespace.as_deref().unwrap_or(&opts.namespace);
        let from = ResourceRef::parse(ns, from)?;
        if from.kind == ResourceKind::Authority {
            return Err(MeshError::unsupported(from.kind, "--from filters"));
        }
        return Ok(Some(TrafficFilter::From(from)));
    }

    // A bare namespace flag filters on every resource of that namespace
    if let Some(ns) = &opts.to_namespace {
        return Ok(Some(TrafficFilter::To(ResourceRef::named(
            ResourceKind::Namespace,
            ns.as_str(),
            ns,
        ))));
    }
    if let Some(ns) = &opts.from_namespace {
        return Ok(Some(TrafficFilter::From(ResourceRef::named(
            ResourceKind::Namespace,
            ns.as_str(),
            ns,
        ))));
    }

    Ok(None)
}

async fn expand_whole_kind<C>(
    cluster: &C,
    target: &ResourceRef,
    all_namespaces: bool,
) -> Result<Vec<ResourceRef>>
where
    C: ClusterState + ?Sized,
{
    let scope = if all_namespaces || target.kind == ResourceKind::Namespace {
        None
    } else {
        Some(target.namespace.as_str())
    };

    let mut objects = cluster.list(target.kind, scope).await?;
    objects.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));

    Ok(objects
        .iter()
        .map(|obj| {
            let namespace = if obj.namespace.is_empty() {
                target.namespace.as_str()
            } else {
                obj.namespace.as_str()
            };
            ResourceRef::named(target.kind, namespace, &obj.name)
        })
        .collect())
}

fn request_for(
    target: ResourceRef,
    filter: &Option<TrafficFilter>,
    opts: &QueryOptions,
) -> MetricRequest {
    MetricRequest {
        target,
        filter: filter.clone(),
        time_window: opts.time_window.clone(),
        kind: opts.request_kind,
        all_namespaces: opts.all_namespaces,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_window() {
        assert_eq!(parse_time_window("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_time_window("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_time_window("2h").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn test_parse_time_window_rejects_malformed() {
        for bad in ["", "m", "10", "1d", "-1m", "1.5m", "1mm", "1µ"] {
            assert!(
                matches!(parse_time_window(bad), Err(MeshError::InvalidArgument(_))),
                "expected {:?} to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("wide".parse::<OutputFormat>().unwrap(), OutputFormat::Wide);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_tap_request_rejects_from() {
        let opts = QueryOptions {
            from_resource: Some("deploy/api".to_string()),
            ..Default::default()
        };
        let args = vec!["deploy/web".to_string()];
        let err = build_tap_request(&args, &opts, &TapOptions::default()).unwrap_err();
        assert!(matches!(err, MeshError::ConflictingOptions(_)));
    }

    #[test]
    fn test_tap_request_carries_to_filter() {
        let opts = QueryOptions {
            to_resource: Some("svc/api".to_string()),
            to_namespace: Some("backend".to_string()),
            ..Default::default()
        };
        let args = vec!["deploy/web".to_string()];
        let req = build_tap_request(&args, &opts, &TapOptions::default()).unwrap();
        assert_eq!(req.target, ResourceRef::named(ResourceKind::Deployment, "default", "web"));
        assert_eq!(
            req.to,
            Some(ResourceRef::named(ResourceKind::Service, "backend", "api"))
        );
    }

    #[test]
    fn test_tap_request_requires_positive_rate() {
        let tap = TapOptions {
            max_rps: 0.0,
            ..Default::default()
        };
        let args = vec!["deploy/web".to_string()];
        let err = build_tap_request(&args, &QueryOptions::default(), &tap).unwrap_err();
        assert!(matches!(err, MeshError::InvalidArgument(_)));
    }
}
