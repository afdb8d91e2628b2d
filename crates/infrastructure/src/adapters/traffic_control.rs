//! `tc` and `iptables` command lines
//!
//! Pure argv builders shared by the container backends. Each builder returns
//! full command lines starting with `tc` or `iptables`; the backend decides how
//! to run them inside the target's network namespace.

use domain::{Fault, Percentage, Rate, TimeSpan};

/// Handle of the prio band that carries shaped link traffic
const LINK_BAND: &str = "1:3";

/// A complete argv, program first
pub type Argv = Vec<String>;

fn argv(parts: &[&str]) -> Argv {
    parts.iter().map(|p| (*p).to_string()).collect()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn format_span(span: &TimeSpan) -> String {
    let millis = span.as_millis();
    if millis.fract() == 0.0 {
        format!("{}ms", millis as u64)
    } else {
        format!("{}us", (millis * 1000.0).round() as u64)
    }
}

fn format_percentage(percentage: Percentage) -> String {
    format!("{}%", percentage.value())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn format_rate(rate: &Rate) -> String {
    format!("{}kbit", rate.as_kbps().round().max(1.0) as u64)
}

/// Queueing discipline parameters for a traffic shaping fault
///
/// Returns `None` for faults that are not applied through `tc`.
#[must_use]
pub fn qdisc_params(fault: &Fault) -> Option<Vec<String>> {
    let params = match fault {
        Fault::Delay { latency, jitter } => {
            let mut params = vec!["netem".to_string(), "delay".to_string(), format_span(latency)];
            if let Some(jitter) = jitter {
                params.push(format_span(jitter));
            }
            params
        },
        Fault::Loss { percentage } => vec![
            "netem".to_string(),
            "loss".to_string(),
            format_percentage(*percentage),
        ],
        Fault::Bandwidth { rate } => vec![
            "tbf".to_string(),
            "rate".to_string(),
            format_rate(rate),
            "burst".to_string(),
            "10kb".to_string(),
            "latency".to_string(),
            "70ms".to_string(),
        ],
        Fault::Crash | Fault::Restart | Fault::Partition => return None,
    };
    Some(params)
}

/// Shape all egress traffic of an interface
///
/// Uses `replace`, so a later fault on the same interface supersedes an
/// earlier one.
#[must_use]
pub fn shape_interface(interface: &str, fault: &Fault) -> Option<Vec<Argv>> {
    let params = qdisc_params(fault)?;
    let mut cmd = argv(&["tc", "qdisc", "replace", "dev", interface, "root"]);
    cmd.extend(params);
    Some(vec![cmd])
}

/// Shape only traffic towards the given peer addresses
///
/// A `prio` root sends matching destinations into band 3, which carries the
/// fault's qdisc. Everything else passes untouched.
#[must_use]
pub fn shape_towards(interface: &str, fault: &Fault, peers: &[String]) -> Option<Vec<Argv>> {
    let params = qdisc_params(fault)?;

    let mut commands = vec![argv(&[
        "tc", "qdisc", "replace", "dev", interface, "root", "handle", "1:", "prio",
    ])];

    let mut band = argv(&[
        "tc", "qdisc", "add", "dev", interface, "parent", LINK_BAND, "handle", "30:",
    ]);
    band.extend(params);
    commands.push(band);

    for peer in peers {
        let dst = format!("{peer}/32");
        commands.push(argv(&[
            "tc", "filter", "add", "dev", interface, "protocol", "ip", "parent", "1:0", "prio",
            "3", "u32", "match", "ip", "dst", &dst, "flowid", LINK_BAND,
        ]));
    }
    Some(commands)
}

/// Remove any root qdisc (and with it every filter) from an interface
#[must_use]
pub fn clear_interface(interface: &str) -> Vec<Argv> {
    vec![argv(&["tc", "qdisc", "del", "dev", interface, "root"])]
}

/// Drop traffic to and from a peer
#[must_use]
pub fn block_peer(peer: &str) -> Vec<Argv> {
    vec![
        argv(&["iptables", "-A", "INPUT", "-s", peer, "-j", "DROP"]),
        argv(&["iptables", "-A", "OUTPUT", "-d", peer, "-j", "DROP"]),
    ]
}

/// Inverse of [`block_peer`]
#[must_use]
pub fn unblock_peer(peer: &str) -> Vec<Argv> {
    vec![
        argv(&["iptables", "-D", "INPUT", "-s", peer, "-j", "DROP"]),
        argv(&["iptables", "-D", "OUTPUT", "-d", peer, "-j", "DROP"]),
    ]
}
