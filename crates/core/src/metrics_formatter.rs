#![allow(clippy::format_push_string)]

use crate::performance::PerformanceMetrics;

pub struct MetricsFormatter;

impl MetricsFormatter {
    #[must_use]
    pub fn format(bot_id: &str, metrics: &PerformanceMetrics) -> String {
        let mut output = String::new();

        output.push('\n');
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push_str(&format!("  PERFORMANCE: {bot_id}\n"));
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push('\n');

        output.push_str("Profit & Loss\n");
        output.push_str("───────────────────────────────────────────────────────────────\n");
        output.push_str(&format!("Net Profit:            {:.2}\n", metrics.net_profit));
        output.push_str(&format!("Gross Profit:          {:.2}\n", metrics.gross_profit));
        output.push_str(&format!("Gross Loss:            {:.2}\n", metrics.gross_loss));
        match metrics.profit_factor {
            Some(factor) => output.push_str(&format!("Profit Factor:         {factor:.2}\n")),
            None => output.push_str("Profit Factor:         N/A\n"),
        }
        output.push_str(&format!("Max Drawdown:          {:.2}\n", metrics.max_drawdown));
        output.push_str(&format!("Total Fees:            {:.4}\n", metrics.total_fees));
        output.push('\n');

        output.push_str("Trade Statistics\n");
        output.push_str("───────────────────────────────────────────────────────────────\n");
        output.push_str(&format!("Total Trades:          {}\n", metrics.total_trades));
        output.push_str(&format!("Closed Trades:         {}\n", metrics.closed_trades));
        output.push_str(&format!("Volume:                {:.2}\n", metrics.total_volume));

        if metrics.closed_trades > 0 {
            output.push_str(&format!(
                "Win Rate:              {:.2}%\n",
                metrics.win_rate * 100.0
            ));
            output.push_str(&format!("Average Win:           {:.2}\n", metrics.average_win));
            output.push_str(&format!("Average Loss:          {:.2}\n", metrics.average_loss));
        } else {
            output.push_str("Win Rate:              N/A (no closed trades)\n");
        }

        output.push('\n');
        output.push_str("═══════════════════════════════════════════════════════════════\n");

        if metrics.total_trades == 0 {
            output.push_str("\nNo trades recorded for this bot yet.\n\n");
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_metrics_mention_no_trades() {
        let text = MetricsFormatter::format("bot-1", &PerformanceMetrics::default());
        assert!(text.contains("bot-1"));
        assert!(text.contains("No trades recorded"));
        assert!(text.contains("Profit Factor:         N/A"));
    }
}
