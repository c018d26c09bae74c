use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use bcb_core::{
    composer::InboundEvent,
    controller::EventContext,
    domain::{ChatId, UserId},
    rates::{profit_cycle, RateTable},
};

use crate::router::AppState;

const HELP_TEXT: &str = "\
How to use this bot:

/start - compose a post step by step (target chat, button URL, text, button label; \
attach a photo or video at any point) and broadcast it after a preview
/cancel - throw away the post you are composing
/rates - cached exchange rates (usdt, rub, sar, usd, kzt)
/convert <amount> <from> <to> - convert between cached currencies
/profit <amount_rub> <rate_usdt_rub> <rate_usdt_sar> <rate_sar_rub> - RUB -> USDT -> SAR -> RUB cycle
/profit_kzt <amount_kzt> <rate_usdt_kzt> <rate_usdt_sar> <rate_sar_kzt> - same cycle for KZT";

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

pub async fn handle_command(msg: Message, text: String, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(owner) = msg.from().map(|u| UserId(u.id.0 as i64)) else {
        return Ok(());
    };
    let chat = ChatId(msg.chat.id.0);
    let ctx = EventContext {
        owner,
        chat,
        preview: None,
    };

    let (cmd, args) = parse_command(&text);
    match cmd.as_str() {
        "start" => state.controller.handle_event(ctx, InboundEvent::Start).await,
        "cancel" => state.controller.handle_event(ctx, InboundEvent::Cancel).await,
        "help" => {
            let _ = state.gateway.send_text(chat, HELP_TEXT).await;
        }
        "rates" => {
            let reply = rates_reply(state.rates.load().ok().flatten());
            let _ = state.gateway.send_text(chat, &reply).await;
        }
        "convert" => {
            let reply = convert_reply(
                &args,
                state.rates.load().ok().flatten(),
                &state.cfg.rate_currencies,
            );
            let _ = state.gateway.send_text(chat, &reply).await;
        }
        "profit" => {
            let _ = state
                .gateway
                .send_text(chat, &profit_reply(&args, "profit", "RUB"))
                .await;
        }
        "profit_kzt" => {
            let _ = state
                .gateway
                .send_text(chat, &profit_reply(&args, "profit_kzt", "KZT"))
                .await;
        }
        _ => {
            let _ = state
                .gateway
                .send_text(chat, "Unknown command. Send /help for the list.")
                .await;
        }
    }

    Ok(())
}

const NO_RATES: &str = "No cached rates yet. Try again in a minute.";

fn rates_reply(table: Option<RateTable>) -> String {
    let Some(table) = table else {
        return NO_RATES.to_string();
    };

    let mut lines = vec![format!("Current rates (fetched {}):", table.fetched_at)];
    let mut froms: Vec<&String> = table.rates.keys().collect();
    froms.sort();
    for from in froms {
        lines.push(format!("{}:", from.to_uppercase()));
        let row = &table.rates[from];
        let mut tos: Vec<&String> = row.keys().collect();
        tos.sort();
        for to in tos {
            lines.push(format!(
                "  {} -> {}: {}",
                from.to_uppercase(),
                to.to_uppercase(),
                row[to]
            ));
        }
    }
    lines.join("\n")
}

fn convert_reply(args: &str, table: Option<RateTable>, currencies: &[String]) -> String {
    let parts: Vec<&str> = args.split_whitespace().collect();
    if parts.len() != 3 {
        return "Usage: /convert <amount> <from> <to>".to_string();
    }

    let Ok(amount) = parts[0].parse::<f64>() else {
        return "Please send a numeric amount.".to_string();
    };
    let (from, to) = (parts[1], parts[2]);

    let Some(table) = table else {
        return NO_RATES.to_string();
    };

    match table.rate(from, to) {
        Some(rate) => format!(
            "{amount} {} = {:.2} {}",
            from.to_uppercase(),
            amount * rate,
            to.to_uppercase()
        ),
        None => format!(
            "Unknown currency pair. Supported codes: {}.",
            currencies.join(", ")
        ),
    }
}

fn profit_reply(args: &str, cmd: &str, currency: &str) -> String {
    let parts: Vec<&str> = args.split_whitespace().collect();
    if parts.len() != 4 {
        let cur = currency.to_lowercase();
        return format!(
            "Usage: /{cmd} <amount_{cur}> <rate_usdt_{cur}> <rate_usdt_sar> <rate_sar_{cur}>"
        );
    }

    let mut nums = [0.0f64; 4];
    for (slot, raw) in nums.iter_mut().zip(&parts) {
        match raw.parse::<f64>() {
            Ok(v) => *slot = v,
            Err(_) => return "Please send numeric values.".to_string(),
        }
    }

    let [initial, rate_usdt_local, rate_usdt_sar, rate_sar_local] = nums;
    let out = profit_cycle(initial, rate_usdt_local, rate_usdt_sar, rate_sar_local);
    format!(
        "{currency} after the cycle: {:.2}\nProfit: {:.2}%",
        out.final_amount, out.profit_pct
    )
}
