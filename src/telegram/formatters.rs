use crate::{
    mint::{MintQuote, MintingParameters, Wei},
    utils,
};

/// Format wei for Telegram (no ANSI colors)
pub fn format_eth_tg(wei: Wei) -> String {
    utils::wei_to_eth_string(wei)
}

/// Format address for Telegram with monospace
pub fn format_address_tg(address: &str) -> String {
    format!("`{}`", utils::format_address(address))
}

pub fn format_params_tg(params: &MintingParameters) -> String {
    let supply = match params.max_supply {
        Some(cap) => format!("{} / {}", params.current_supply, cap),
        None => format!("{} (unlimited)", params.current_supply),
    };
    format!(
        "⚙️ *Minting Parameters*\n\n\
        FID range: {} - {}\n\
        Base price: {}\n\
        Pro price: {}\n\
        Pro discount: {}\n\
        Supply: {}\n\
        Status: {}",
        params.min_fid,
        params.max_fid,
        format_eth_tg(params.base_mint_price),
        format_eth_tg(params.pro_mint_price),
        if params.require_pro_for_discount { "on" } else { "off" },
        supply,
        if params.paused { "⏸ Paused" } else { "🟢 Active" },
    )
}

pub fn format_quote_tg(quote: &MintQuote) -> String {
    let icon = if quote.eligible { "✅" } else { "⛔" };
    let mut text = format!(
        "{} *FID {}*\n\n{}\nPrice: {}\nPro: {}",
        icon,
        quote.fid,
        quote.reason,
        format_eth_tg(quote.price),
        if quote.is_pro { "yes" } else { "no" },
    );
    if let Some(token_id) = quote.token_id {
        text.push_str(&format!("\nToken: #{}", token_id));
    }
    text
}
