//! Selector resolution.
//!
//! Callers identify devices with free-form strings: exact ids, names,
//! globs, fragments, or product-class words like "mppt". Resolution runs a
//! strict tier ladder per selector; the first tier that matches wins and a
//! glob that matches nothing stops resolution for that selector outright.
//!
//! The alias table is a plain value built fresh per call: a static seed
//! extended by keywords learned from the site overview. Learning appends
//! unseen lowercase strings and never overwrites existing ones, and the
//! matching path never depends on whether enrichment succeeded.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::canonical::{CanonicalType, DeviceId};
use crate::error::Result;
use crate::glob::{glob_to_regex, is_glob};

/// Slim device reference the selector engine matches against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRef {
    #[serde(rename = "deviceId")]
    pub device_id: DeviceId,
    #[serde(rename = "type")]
    pub device_type: CanonicalType,
    pub instance: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl DeviceRef {
    pub fn new(device_type: CanonicalType, instance: i64, name: Option<String>) -> Self {
        Self {
            device_id: DeviceId::new(&device_type, instance),
            device_type,
            instance,
            name,
        }
    }
}

/// Alias keywords per canonical type plus bare class-alias keywords.
#[derive(Debug, Clone)]
pub struct AliasTable {
    type_aliases: BTreeMap<String, Vec<String>>,
    class_aliases: BTreeMap<String, Vec<String>>,
}

impl AliasTable {
    /// The static seed every call starts from.
    pub fn seeded() -> Self {
        let mut type_aliases = BTreeMap::new();
        for (ty, aliases) in [
            ("solar_charger", &["mppt", "solar charger", "solar", "charger"][..]),
            ("vebus", &["vebus", "inverter", "multiplus"][..]),
            ("type_106", &["skylla", "dc charger", "charger"][..]),
            ("charger", &["skylla", "dc charger", "charger"][..]),
            ("battery_monitor", &["battery", "bms", "battery monitor"][..]),
            ("temp_sensor", &["temperature", "temp", "sensor", "temperature sensor"][..]),
            ("alternator", &["alternator"][..]),
        ] {
            type_aliases.insert(
                ty.to_string(),
                aliases.iter().map(|a| (*a).to_string()).collect(),
            );
        }

        let mut class_aliases = BTreeMap::new();
        for (key, types) in [
            ("mppt", &["solar_charger"][..]),
            ("multiplus", &["vebus"][..]),
            ("inverter", &["vebus"][..]),
            ("skylla", &["type_106", "charger"][..]),
        ] {
            class_aliases.insert(
                key.to_string(),
                types.iter().map(|t| (*t).to_string()).collect(),
            );
        }

        Self {
            type_aliases,
            class_aliases,
        }
    }

    /// Append a lowercase alias for a canonical type, ignoring empty values
    /// and duplicates.
    pub fn push_type_alias(&mut self, device_type: &CanonicalType, value: &str) {
        let lc = value.trim().to_lowercase();
        if lc.is_empty() {
            return;
        }
        let aliases = self
            .type_aliases
            .entry(device_type.name().into_owned())
            .or_default();
        if !aliases.contains(&lc) {
            aliases.push(lc);
        }
    }

    /// Aliases registered for a canonical type.
    pub fn type_aliases(&self, device_type: &CanonicalType) -> &[String] {
        self.type_aliases
            .get(device_type.name().as_ref())
            .map_or(&[], Vec::as_slice)
    }

    /// Target types of a class-alias keyword, if registered.
    pub fn class_alias_types(&self, keyword: &str) -> Option<&[String]> {
        self.class_aliases.get(keyword).map(Vec::as_slice)
    }
}

/// Outcome of the best-effort enrichment phase.
///
/// `complete` is false when either site fetch was missing; resolution still
/// ran with whatever state existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enrichment {
    pub complete: bool,
    pub learned_aliases: bool,
    pub virtual_devices: usize,
}

fn cerbo_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)cerbo\s*gx").expect("cerbo pattern is valid"))
}

/// Guess a canonical type from an overview device's product name / class.
fn guess_type_from_overview(device: &Value) -> Option<CanonicalType> {
    let product = device
        .get("productName")
        .and_then(Value::as_str)
        .or_else(|| device.get("name").and_then(Value::as_str))
        .unwrap_or("")
        .to_lowercase();
    let class = device
        .get("class")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_lowercase();

    if product.contains("smartsolar") || product.contains("mppt") {
        return Some(CanonicalType::SolarCharger);
    }
    if ["quattro", "multiplus", "ve.bus", "vebus"]
        .iter()
        .any(|kw| product.contains(kw))
        || class.contains("device-ve-bus")
    {
        return Some(CanonicalType::Vebus);
    }
    if product.contains("lynx") || product.contains("bms") {
        return Some(CanonicalType::BatteryMonitor);
    }
    if product.contains("ruuvi") || product.contains("temperature") || class.contains("temperature")
    {
        return Some(CanonicalType::TempSensor);
    }
    if ["wakespeed", "ws500", "alternator"]
        .iter()
        .any(|kw| product.contains(kw))
    {
        return Some(CanonicalType::Alternator);
    }
    if product.contains("skylla") {
        return Some(CanonicalType::Charger);
    }
    if cerbo_pattern().is_match(&product)
        || product.contains("gateway")
        || class.contains("device-gateway")
    {
        return Some(CanonicalType::Gateway);
    }
    None
}

/// Recognized brand/model tokens of a product name, registered as extra
/// aliases.
fn brand_tokens(product_name: &str) -> Vec<&'static str> {
    let mut tokens = Vec::new();
    if cerbo_pattern().is_match(product_name) {
        tokens.extend(["cerbo", "cerbo gx", "gateway"]);
    }
    let lc = product_name.to_lowercase();
    if lc.contains("quattro") {
        tokens.push("quattro");
    }
    if lc.contains("smartsolar") {
        tokens.push("smartsolar");
    }
    if lc.contains("lynx") {
        tokens.push("lynx");
    }
    if lc.contains("wakespeed") || lc.contains("ws500") {
        tokens.extend(["wakespeed", "ws500"]);
    }
    tokens
}

fn overview_devices(overview: &Value) -> &[Value] {
    overview
        .get("records")
        .and_then(|r| r.get("devices"))
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

/// Apply best-effort site enrichment to the catalog and alias table.
///
/// `overview` and `widgets` are the already-fetched (possibly failed, hence
/// `None`) site overview and GPS-widget availability probe. Enrichment only
/// ever adds state; a missing input degrades the outcome without touching
/// the primary resolution path.
pub fn enrich_from_site(
    catalog: &mut Vec<DeviceRef>,
    aliases: &mut AliasTable,
    overview: Option<&Value>,
    widgets: Option<&Value>,
) -> Enrichment {
    let mut learned = false;
    let mut virtual_devices = 0;

    if let Some(overview) = overview {
        for device in overview_devices(overview) {
            let Some(device_type) = guess_type_from_overview(device) else {
                continue;
            };
            for field in ["productName", "customName"] {
                if let Some(value) = device.get(field).and_then(Value::as_str) {
                    aliases.push_type_alias(&device_type, value);
                    learned = true;
                }
            }
            if let Some(product) = device.get("productName").and_then(Value::as_str) {
                for token in brand_tokens(product) {
                    aliases.push_type_alias(&device_type, token);
                    learned = true;
                }
            }
        }
    }

    if let Some(widgets) = widgets {
        let gps_available = widgets
            .get("widgets")
            .and_then(Value::as_array)
            .is_some_and(|list| {
                list.iter().any(|w| {
                    w.get("widget")
                        .and_then(Value::as_str)
                        .is_some_and(|name| name.eq_ignore_ascii_case("GPS"))
                        && w.get("available").and_then(Value::as_bool).unwrap_or(false)
                })
            });
        if gps_available {
            catalog.push(DeviceRef::new(CanonicalType::Gps, 0, Some("GPS".to_string())));
            aliases.push_type_alias(&CanonicalType::Gps, "gps");
            virtual_devices += 1;
        }
    }

    if let Some(overview) = overview {
        let gateway = overview_devices(overview).iter().find(|d| {
            d.get("productName")
                .and_then(Value::as_str)
                .is_some_and(|p| cerbo_pattern().is_match(p))
                || d.get("class")
                    .and_then(Value::as_str)
                    .is_some_and(|c| c.contains("device-gateway"))
        });
        if let Some(gateway) = gateway {
            let name = gateway
                .get("productName")
                .and_then(Value::as_str)
                .or_else(|| gateway.get("name").and_then(Value::as_str))
                .filter(|s| !s.is_empty())
                .unwrap_or("Gateway");
            catalog.push(DeviceRef::new(
                CanonicalType::Gateway,
                0,
                Some(name.to_string()),
            ));
            for alias in ["gateway", "cerbo", "cerbo gx"] {
                aliases.push_type_alias(&CanonicalType::Gateway, alias);
            }
            virtual_devices += 1;
        }
    }

    let complete = overview.is_some() && widgets.is_some();
    if !complete {
        debug!(
            overview = overview.is_some(),
            widgets = widgets.is_some(),
            "selector enrichment degraded"
        );
    }
    Enrichment {
        complete,
        learned_aliases: learned,
        virtual_devices,
    }
}

/// Resolution result for one selector.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSelector {
    pub selector: String,
    pub matches: Vec<DeviceRef>,
}

/// Resolution result for a selector list.
#[derive(Debug, Clone, Serialize)]
pub struct SelectorResolution {
    pub resolved: Vec<ResolvedSelector>,
    pub unmatched: Vec<String>,
}

fn lower(s: &str) -> String {
    s.to_lowercase()
}

fn collapse_spaces_lower(s: &str) -> String {
    s.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect()
}

fn collapse_non_word_lower(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

fn sorted(mut matches: Vec<DeviceRef>) -> Vec<DeviceRef> {
    matches.sort_by(|a, b| {
        a.device_type
            .name()
            .cmp(&b.device_type.name())
            .then_with(|| a.instance.cmp(&b.instance))
            .then_with(|| a.name.as_deref().unwrap_or("").cmp(b.name.as_deref().unwrap_or("")))
    });
    matches
}

fn match_selector(selector: &str, catalog: &[DeviceRef], aliases: &AliasTable) -> Result<Vec<DeviceRef>> {
    let trimmed = selector.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let lc = lower(trimmed);
    let lc_no_space = collapse_spaces_lower(trimmed);
    let lc_no_punct = collapse_non_word_lower(trimmed);

    let mut matches: Vec<DeviceRef> = Vec::new();
    let push = |matches: &mut Vec<DeviceRef>, d: &DeviceRef| {
        if !matches.iter().any(|m| m.device_id == d.device_id) {
            matches.push(d.clone());
        }
    };

    // Tier 1: exact device id.
    for d in catalog {
        if trimmed == d.device_id.as_str() {
            push(&mut matches, d);
        }
    }
    if !matches.is_empty() {
        return Ok(sorted(matches));
    }

    // Tier 2: exact name under lowercase / space-collapsed / punctuation-
    // stripped normalization.
    for d in catalog {
        let Some(name) = d.name.as_deref() else { continue };
        if lower(name) == lc
            || collapse_spaces_lower(name) == lc_no_space
            || collapse_non_word_lower(name) == lc_no_punct
        {
            push(&mut matches, d);
        }
    }
    if !matches.is_empty() {
        return Ok(sorted(matches));
    }

    // Tier 3: glob over device id and name forms. A glob that matches
    // nothing ends resolution for this selector.
    let selector_is_glob = is_glob(trimmed);
    if selector_is_glob {
        let rx = glob_to_regex(trimmed)?;
        let rx_collapsed = glob_to_regex(&lc_no_space)?;
        let rx_no_punct = glob_to_regex(&lc_no_punct)?;
        for d in catalog {
            let name_hit = d.name.as_deref().is_some_and(|name| {
                rx.is_match(name)
                    || rx_collapsed.is_match(&collapse_spaces_lower(name))
                    || rx_no_punct.is_match(&collapse_non_word_lower(name))
            });
            if rx.is_match(d.device_id.as_str()) || name_hit {
                push(&mut matches, d);
            }
        }
        return Ok(sorted(matches));
    }

    // Tier 4: substring either way against name forms, or against the
    // type's registered aliases.
    for d in catalog {
        let alias_hit = aliases
            .type_aliases(&d.device_type)
            .iter()
            .any(|a| a.contains(&lc) || lc.contains(a.as_str()));
        let name_hit = d.name.as_deref().is_some_and(|name| {
            let name_lc = lower(name);
            let name_no_space = collapse_spaces_lower(name);
            let name_no_punct = collapse_non_word_lower(name);
            name_lc.contains(&lc)
                || lc.contains(&name_lc)
                || name_no_space.contains(&lc_no_space)
                || lc_no_space.contains(&name_no_space)
                || name_no_punct.contains(&lc_no_punct)
                || lc_no_punct.contains(&name_no_punct)
        });
        if name_hit || alias_hit {
            push(&mut matches, d);
        }
    }
    if !matches.is_empty() {
        return Ok(sorted(matches));
    }

    // Tier 5: class alias mapping straight to canonical types.
    if let Some(target_types) = aliases.class_alias_types(&lc) {
        for d in catalog {
            if target_types.iter().any(|t| t == d.device_type.name().as_ref()) {
                push(&mut matches, d);
            }
        }
    }
    Ok(sorted(matches))
}

/// Resolve every selector against the catalog, in input order.
pub fn resolve_selectors(
    selectors: &[String],
    catalog: &[DeviceRef],
    aliases: &AliasTable,
) -> Result<SelectorResolution> {
    let mut resolved = Vec::with_capacity(selectors.len());
    let mut unmatched = Vec::new();
    for selector in selectors {
        let matches = match_selector(selector, catalog, aliases)?;
        if matches.is_empty() {
            unmatched.push(selector.clone());
        }
        resolved.push(ResolvedSelector {
            selector: selector.clone(),
            matches,
        });
    }
    Ok(SelectorResolution {
        resolved,
        unmatched,
    })
}
