//! KDL configuration parsing.
//!
//! ```kdl
//! domains "example.com" "cdn.example.com"
//! renewal-days-before-expiry 30
//! acme-home "~/.acme.sh"
//! email "admin@example.com"
//!
//! aliyun {
//!     access-key-id "LTAI..."
//!     access-key-secret "..."
//!     region "cn-hangzhou"
//! }
//!
//! qiniu {
//!     access-key "..."
//!     secret-key "..."
//!     force-https #true
//! }
//!
//! propagation {
//!     delay-secs 60
//!     wait-on-update #true
//! }
//! ```

mod helpers;

pub use helpers::offset_to_line_col;

use anyhow::Result;
use std::path::PathBuf;
use tracing::trace;

use crate::providers::{
    default_aliyun_endpoint, default_propagation_delay, default_qiniu_api_base, default_region,
    AliyunConfig, PropagationConfig, QiniuConfig,
};
use crate::{
    default_acme_home, default_acme_server, default_acme_timeout, default_http_timeout,
    default_log_file, default_record_file, default_renewal_days, default_validity_days, Config,
};

use helpers::{
    get_bool_entry, get_string, get_string_args, get_string_entry, get_u64, get_u64_entry,
};

const TOP_LEVEL_NODES: &[&str] = &[
    "domains",
    "renewal-days-before-expiry",
    "acme-home",
    "email",
    "acme-server",
    "record-file",
    "log-file",
    "certificate-validity-days",
    "acme-timeout-secs",
    "http-timeout-secs",
    "aliyun",
    "qiniu",
    "propagation",
];

fn to_u32(name: &str, value: Option<u64>, default: u32) -> Result<u32> {
    match value {
        Some(v) => u32::try_from(v).map_err(|_| anyhow::anyhow!("'{}' is out of range: {}", name, v)),
        None => Ok(default),
    }
}

// ============================================================================
// Top-Level Document Parser
// ============================================================================

/// Convert a parsed KDL document to Config
pub fn parse_kdl_document(doc: &::kdl::KdlDocument) -> Result<Config> {
    for node in doc.nodes() {
        let name = node.name().value();
        if !TOP_LEVEL_NODES.contains(&name) {
            return Err(anyhow::anyhow!(
                "Unknown top-level configuration node: '{}'\nValid nodes are: {}",
                name,
                TOP_LEVEL_NODES.join(", ")
            ));
        }
    }

    let aliyun = doc
        .get("aliyun")
        .map(parse_aliyun_config)
        .transpose()?
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Missing required 'aliyun' configuration block\n\
                 Example:\n\
                 aliyun {{\n\
                     access-key-id \"LTAI...\"\n\
                     access-key-secret \"...\"\n\
                 }}"
            )
        })?;

    let qiniu = doc
        .get("qiniu")
        .map(parse_qiniu_config)
        .transpose()?
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Missing required 'qiniu' configuration block\n\
                 Example:\n\
                 qiniu {{\n\
                     access-key \"...\"\n\
                     secret-key \"...\"\n\
                 }}"
            )
        })?;

    let propagation = match doc.get("propagation") {
        Some(node) => parse_propagation_config(node)?,
        None => PropagationConfig::default(),
    };

    let config = Config {
        domains: get_string_args(doc, "domains"),
        renewal_days_before_expiry: to_u32(
            "renewal-days-before-expiry",
            get_u64(doc, "renewal-days-before-expiry")?,
            default_renewal_days(),
        )?,
        acme_home: get_string(doc, "acme-home")
            .map(PathBuf::from)
            .unwrap_or_else(default_acme_home),
        email: get_string(doc, "email"),
        acme_server: get_string(doc, "acme-server").unwrap_or_else(default_acme_server),
        aliyun,
        qiniu,
        record_file: get_string(doc, "record-file")
            .map(PathBuf::from)
            .unwrap_or_else(default_record_file),
        log_file: get_string(doc, "log-file").unwrap_or_else(default_log_file),
        certificate_validity_days: to_u32(
            "certificate-validity-days",
            get_u64(doc, "certificate-validity-days")?,
            default_validity_days(),
        )?,
        acme_timeout_secs: get_u64(doc, "acme-timeout-secs")?.unwrap_or_else(default_acme_timeout),
        http_timeout_secs: get_u64(doc, "http-timeout-secs")?.unwrap_or_else(default_http_timeout),
        propagation,
    };

    trace!(
        domain_count = config.domains.len(),
        renewal_days = config.renewal_days_before_expiry,
        "Parsed KDL configuration"
    );

    Ok(config)
}

fn parse_aliyun_config(node: &::kdl::KdlNode) -> Result<AliyunConfig> {
    let require = |name: &str| {
        get_string_entry(node, name)
            .ok_or_else(|| anyhow::anyhow!("'aliyun' block requires a '{}' field", name))
    };

    Ok(AliyunConfig {
        access_key_id: require("access-key-id")?,
        access_key_secret: require("access-key-secret")?,
        region: get_string_entry(node, "region").unwrap_or_else(default_region),
        endpoint: get_string_entry(node, "endpoint").unwrap_or_else(default_aliyun_endpoint),
    })
}

fn parse_qiniu_config(node: &::kdl::KdlNode) -> Result<QiniuConfig> {
    let require = |name: &str| {
        get_string_entry(node, name)
            .ok_or_else(|| anyhow::anyhow!("'qiniu' block requires a '{}' field", name))
    };

    Ok(QiniuConfig {
        access_key: require("access-key")?,
        secret_key: require("secret-key")?,
        force_https: get_bool_entry(node, "force-https").unwrap_or(false),
        api_base: get_string_entry(node, "api-base").unwrap_or_else(default_qiniu_api_base),
    })
}

fn parse_propagation_config(node: &::kdl::KdlNode) -> Result<PropagationConfig> {
    Ok(PropagationConfig {
        delay_secs: get_u64_entry(node, "delay-secs")?.unwrap_or_else(default_propagation_delay),
        wait_on_update: get_bool_entry(node, "wait-on-update").unwrap_or(true),
    })
}

/// Render a KDL parse error with the offending source lines
pub fn render_parse_error(content: &str, e: &::kdl::KdlError) -> String {
    use miette::Diagnostic;

    let mut error_msg = String::from("KDL configuration parse error:\n\n");
    let lines: Vec<&str> = content.lines().collect();
    let mut found_details = false;

    if let Some(related) = e.related() {
        for diagnostic in related {
            error_msg.push_str(&format!("  {}\n", diagnostic));
            found_details = true;

            let Some(labels) = diagnostic.labels() else {
                continue;
            };
            for label in labels {
                let (line, col) = offset_to_line_col(content, label.offset());
                error_msg.push_str(&format!("\n  --> at line {}, column {}\n", line, col));

                if let Some(line_content) = lines.get(line.saturating_sub(1)) {
                    error_msg.push_str(&format!("{:>4} | {}\n", line, line_content));
                    error_msg.push_str(&format!("     | {}^", " ".repeat(col.saturating_sub(1))));
                    if let Some(label_msg) = label.label() {
                        error_msg.push_str(&format!(" {}", label_msg));
                    }
                    error_msg.push('\n');
                }
            }

            if let Some(help) = diagnostic.help() {
                error_msg.push_str(&format!("\n  Help: {}\n", help));
            }
        }
    }

    if !found_details {
        error_msg.push_str(&format!("  {}\n", e));
    }

    error_msg
}
