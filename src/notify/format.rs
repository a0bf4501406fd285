//! Message text for alerts, cycle updates and command replies.

use serde_json::json;

use crate::engine::LONG_INTERVAL_WARN_MINUTES;
use crate::types::{AlertPayload, CycleUpdate, StatusView};

const FOOTER: &str = "Airline Club Oil Price Monitor";
const ALERT_COLOR: u32 = 15_158_332;

fn status_label(above: bool, threshold: f64) -> String {
    if above {
        format!("✅ Above threshold (${threshold:.2})")
    } else {
        format!("⚠️ Below threshold (${threshold:.2})")
    }
}

fn mention(user_id: &str) -> String {
    format!("<@{user_id}>")
}

/// `🛢️ **Cycle 12** | **Price: $56.00** | **Status: ✅ Above threshold ($55.00)**`
pub fn cycle_line(update: &CycleUpdate) -> String {
    let mut line = format!(
        "🛢️ **Cycle {}** | **Price: ${:.2}** | **Status: {}**",
        update.cycle,
        update.price,
        status_label(update.is_above_threshold(), update.threshold),
    );
    if let (Some(end), Some(remaining)) = (update.contract_end_cycle, update.cycles_remaining) {
        line.push_str(&format!(
            "\n📝 Contract active: {remaining} cycles remaining (ends cycle {end})"
        ));
    }
    line
}

/// Webhook body for a cycle update. The user is mentioned only on alerts.
pub fn cycle_message(update: &CycleUpdate, user_id: Option<&str>) -> serde_json::Value {
    let line = cycle_line(update);
    let content = match user_id {
        Some(id) if update.alert => format!("{}\n{line}", mention(id)),
        _ => line,
    };
    json!({ "content": content })
}

/// Webhook body for a standalone alert embed.
pub fn alert_message(alert: &AlertPayload, user_id: Option<&str>, timestamp: &str) -> serde_json::Value {
    let mut fields = vec![
        json!({ "name": "Current Price", "value": format!("${:.2}", alert.price), "inline": true }),
        json!({ "name": "Threshold", "value": format!("${:.2}", alert.threshold), "inline": true }),
        json!({ "name": "Cycle", "value": alert.cycle.to_string(), "inline": true }),
    ];
    if let Some(remaining) = alert.contract_remaining {
        fields.push(json!({ "name": "Contract", "value": format!("{remaining} cycles remaining"), "inline": true }));
    }
    fields.push(json!({ "name": "Timestamp", "value": timestamp, "inline": false }));

    json!({
        "content": user_id.map(mention).unwrap_or_default(),
        "embeds": [{
            "title": "⚠️ Oil Price Alert!",
            "description": "Oil price has dropped below your threshold!",
            "color": ALERT_COLOR,
            "fields": fields,
            "footer": { "text": FOOTER },
        }]
    })
}

pub fn status_text(view: &StatusView) -> String {
    let contract = match (view.contract_end_cycle, view.cycles_remaining) {
        (Some(end), Some(remaining)) if view.contract_active => {
            format!("✅ Active until cycle {end} ({remaining} cycles remaining)")
        }
        _ => "❌ No active contract".to_string(),
    };
    let price_status = if view.is_above_threshold() {
        format!("✅ Above threshold (by ${:.2})", view.price - view.threshold)
    } else {
        format!("⚠️ Below threshold (by ${:.2})", view.threshold - view.price)
    };
    format!(
        "🛢️ Oil Price Status\n\
         Current Cycle: {}\n\
         Current Price: ${:.2}\n\
         Threshold: ${:.2}\n\
         Check Interval: {} minutes\n\
         Contract Status: {contract}\n\
         Price Status: {price_status}",
        view.cycle, view.price, view.threshold, view.interval_minutes,
    )
}

pub fn contract_registered(current_cycle: i64, end_cycle: i64, cycles: i64) -> String {
    format!(
        "✅ Contract Registered! You won't be pinged until cycle {end_cycle} ({cycles} cycles from now).\n\
         Current Cycle: {current_cycle} | Contract End Cycle: {end_cycle} | Cycles Remaining: {cycles}"
    )
}

pub fn contract_cleared(had_contract: bool) -> String {
    if had_contract {
        "✅ Contract Cleared. You will now receive price alerts normally.".to_string()
    } else {
        "ℹ️ No Active Contract. You don't have an active contract to clear.".to_string()
    }
}

pub fn threshold_updated(value: f64) -> String {
    format!(
        "✅ Threshold Updated. Alert threshold has been set to ${value:.2}; \
         you will be alerted when oil price drops below ${value:.2}."
    )
}

pub fn interval_updated(minutes: u32, long: bool) -> String {
    let mut text = String::new();
    if long {
        text.push_str(&format!(
            "⚠️ Warning: Setting interval to more than {LONG_INTERVAL_WARN_MINUTES} minutes may result in missing price changes.\n"
        ));
    }
    text.push_str(&format!(
        "✅ Check Interval Updated. Prices will now be checked every {minutes} minute(s)."
    ));
    text
}

pub fn help_text() -> &'static str {
    "🤖 Oil Price Bot Commands\n\
     $contract <cycles>  - pause alerts for the given number of cycles (e.g. `$contract 52`)\n\
     $status             - show current price, cycle, threshold and contract status\n\
     $clear              - clear any active contract and resume normal alerts\n\
     $threshold <price>  - set the alert threshold price (e.g. `$threshold 60`)\n\
     $interval <minutes> - set how often to check prices (e.g. `$interval 5`)\n\
     $help               - show this help message"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(price: f64, alert: bool, contract: Option<(i64, i64)>) -> CycleUpdate {
        CycleUpdate {
            price,
            cycle: 12,
            threshold: 55.0,
            contract_end_cycle: contract.map(|c| c.0),
            cycles_remaining: contract.map(|c| c.1),
            alert,
        }
    }

    #[test]
    fn cycle_line_marks_threshold_side() {
        let line = cycle_line(&update(56.0, false, None));
        assert_eq!(
            line,
            "🛢️ **Cycle 12** | **Price: $56.00** | **Status: ✅ Above threshold ($55.00)**"
        );
        assert!(cycle_line(&update(50.0, false, None)).contains("⚠️ Below threshold"));
    }

    #[test]
    fn cycle_line_includes_contract() {
        let line = cycle_line(&update(50.0, false, Some((40, 28))));
        assert!(line.ends_with("📝 Contract active: 28 cycles remaining (ends cycle 40)"));
    }

    #[test]
    fn cycle_message_mentions_only_on_alert() {
        let quiet = cycle_message(&update(50.0, false, None), Some("42"));
        assert!(!quiet["content"].as_str().unwrap().contains("<@42>"));

        let loud = cycle_message(&update(50.0, true, None), Some("42"));
        assert!(loud["content"].as_str().unwrap().starts_with("<@42>\n"));

        let nobody = cycle_message(&update(50.0, true, None), None);
        assert!(!nobody["content"].as_str().unwrap().contains("<@"));
    }

    #[test]
    fn alert_message_has_embed_fields() {
        let alert = AlertPayload {
            price: 50.0,
            cycle: 10,
            threshold: 55.0,
            contract_remaining: None,
        };
        let body = alert_message(&alert, Some("42"), "2026-01-01 00:00:00 UTC");
        assert_eq!(body["content"], "<@42>");
        let fields = body["embeds"][0]["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0]["value"], "$50.00");
        assert_eq!(fields[2]["value"], "10");
    }

    #[test]
    fn status_text_reports_contract_and_margin() {
        let view = StatusView {
            price: 50.0,
            cycle: 120,
            threshold: 55.0,
            interval_minutes: 10,
            contract_active: true,
            contract_end_cycle: Some(152),
            cycles_remaining: Some(32),
        };
        let text = status_text(&view);
        assert!(text.contains("Active until cycle 152 (32 cycles remaining)"));
        assert!(text.contains("Below threshold (by $5.00)"));
    }

    #[test]
    fn long_interval_reply_warns() {
        assert!(interval_updated(90, true).starts_with("⚠️ Warning"));
        assert!(!interval_updated(5, false).contains("Warning"));
    }
}
