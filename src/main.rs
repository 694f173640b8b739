mod cli;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Commands, OutputFormat};
use colored::*;
use fid_mint::{
    config::Config,
    error::{self, MintError},
    identity::IdentityClient,
    mint::{get_mint_price, MintService},
    server::{self, handlers::ParamsData},
    telegram, utils,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fid_mint=debug,info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let service = match MintService::open(&config) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!("Failed to open mint ledger: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve => run_server(config, service).await,
        Commands::Check { fid, pro } => check_fid(&service, fid, pro).await,
        Commands::Mint { fid, payment, pro, yes } => {
            info!("Minting for FID {}", fid);
            mint_fid(&config, &service, fid, &payment, pro, yes).await
        }
        Commands::Params { format } => show_params(&service, format).await,
        Commands::SetRange { min_fid, max_fid } => {
            let owner = service.owner().await;
            report(&config, service.set_fid_range(&owner, min_fid, max_fid).await).await
        }
        Commands::SetPrices { base, pro } => set_prices(&config, &service, &base, &pro).await,
        Commands::Pause => {
            let owner = service.owner().await;
            report(&config, service.set_paused(&owner, true).await).await
        }
        Commands::Resume => {
            let owner = service.owner().await;
            report(&config, service.set_paused(&owner, false).await).await
        }
        Commands::SetPro { fid, is_pro } => {
            let owner = service.owner().await;
            report(&config, service.set_pro_status(&owner, fid, is_pro).await).await
        }
        Commands::SetMaxSupply { max_supply } => {
            let owner = service.owner().await;
            report(&config, service.set_max_supply(&owner, max_supply).await).await
        }
        Commands::SetOracle { oracle } => {
            let owner = service.owner().await;
            report(&config, service.set_oracle(&owner, oracle).await).await
        }
        Commands::TransferOwnership { new_owner, yes } => {
            transfer_ownership(&config, &service, &new_owner, yes).await
        }
        Commands::Stats { format } => show_stats(&service, format).await,
        Commands::History { limit } => show_history(&service, limit).await,
        Commands::User { fids } => show_users(&config, &fids).await,
        Commands::Init => initialize(&config, &service).await,
        Commands::Telegram => {
            info!("Starting Telegram bot interface...");
            telegram::run_telegram_bot(config, service).await
        }
    };

    if let Err(e) = result {
        error!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }
}

fn parse_eth(amount: &str) -> error::Result<u128> {
    utils::eth_to_wei(amount).map_err(|e| MintError::InvalidAmount(format!("{}: {}", amount, e)))
}

/// Print an applied admin change and forward it to Telegram.
async fn report(config: &Config, result: error::Result<fid_mint::mint::AdminChange>) -> error::Result<()> {
    let change = result?;
    println!(
        "{} {} = {} (by {})",
        "✓".green(),
        change.action.cyan(),
        change.detail,
        utils::format_address(&change.actor)
    );
    if let Some(notifier) = telegram::AutoNotifier::new(config) {
        notifier.notify_parameter_change(&change).await;
    }
    Ok(())
}

async fn run_server(config: Config, service: Arc<MintService>) -> error::Result<()> {
    if config.server.admin_token.is_empty() {
        warn!("server.admin_token is empty; admin endpoints will reject every request");
    }

    if config.telegram.is_some() {
        let bot_config = config.clone();
        let bot_service = service.clone();
        tokio::spawn(async move {
            if let Err(e) = telegram::run_telegram_bot(bot_config, bot_service).await {
                error!("Telegram bot stopped: {}", e);
            }
        });
    }

    server::serve(&config, service).await
}

async fn check_fid(service: &MintService, fid: u64, pro: bool) -> error::Result<()> {
    if fid == 0 {
        return Err(MintError::InvalidFid("FID must be positive".to_string()));
    }
    let quote = service.quote(fid).await;

    println!("{}", format!("=== FID {} ===", fid).cyan().bold());
    if quote.eligible {
        println!("Status:  {}", quote.reason.green());
    } else {
        println!("Status:  {}", quote.reason.red());
    }
    println!("Pro:     {}", if quote.is_pro { "yes" } else { "no" });
    println!("Price:   {}", utils::format_eth(quote.price));

    if pro && !quote.is_pro {
        let params = service.params().await;
        println!("As Pro:  {}", utils::format_eth(get_mint_price(true, &params)));
    }

    if let Some(token_id) = quote.token_id {
        println!("Token:   #{}", token_id);
    }

    Ok(())
}

async fn mint_fid(
    config: &Config,
    service: &MintService,
    fid: u64,
    payment: &str,
    pro: bool,
    yes: bool,
) -> error::Result<()> {
    let payment = parse_eth(payment)?;
    service.precheck(fid).await?;
    service.check(fid).await?;

    let quote = service.quote(fid).await;
    let price = if pro && !quote.is_pro {
        get_mint_price(true, &service.params().await)
    } else {
        quote.price
    };
    println!("Price:   {}", utils::format_eth(price));
    println!("Paying:  {}", utils::format_eth(payment));

    if !yes && !utils::confirm_action(&format!("Mint for FID {}?", fid)) {
        println!("Cancelled");
        return Ok(());
    }

    if pro && !quote.is_pro {
        let owner = service.owner().await;
        service.set_pro_status(&owner, fid, true).await?;
    }

    let receipt = service.attempt_mint(fid, payment).await?;
    println!("{}", "✓ Mint successful!".green());
    println!("Token:   #{}", receipt.token_id);
    println!("Paid:    {}", utils::format_eth(receipt.price));
    println!("Supply:  {}", receipt.current_supply);

    if let Some(notifier) = telegram::AutoNotifier::new(config) {
        notifier.notify_mint(&receipt).await;
    }

    Ok(())
}

async fn show_params(service: &MintService, format: OutputFormat) -> error::Result<()> {
    let params = service.params().await;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&ParamsData::from(params))?);
        }
        OutputFormat::Toml => {
            let text = toml::to_string_pretty(&ParamsData::from(params))
                .map_err(|e| MintError::Other(e.into()))?;
            println!("{}", text);
        }
        OutputFormat::Table => {
            println!("{}", "=== Minting Parameters ===".cyan().bold());
            println!("FID range:     {} - {}", params.min_fid, params.max_fid);
            println!("Base price:    {}", utils::format_eth(params.base_mint_price));
            println!("Pro price:     {}", utils::format_eth(params.pro_mint_price));
            println!(
                "Pro discount:  {}",
                if params.require_pro_for_discount { "on" } else { "off" }
            );
            match params.max_supply {
                Some(cap) => println!("Supply:        {} / {}", params.current_supply, cap),
                None => println!("Supply:        {} (unlimited)", params.current_supply),
            }
            if params.paused {
                println!("Status:        {}", "PAUSED".red());
            } else {
                println!("Status:        {}", "ACTIVE".green());
            }
        }
    }

    Ok(())
}

async fn set_prices(config: &Config, service: &MintService, base: &str, pro: &str) -> error::Result<()> {
    let base = parse_eth(base)?;
    let pro = parse_eth(pro)?;
    let owner = service.owner().await;
    report(config, service.set_prices(&owner, base, pro).await).await
}

async fn transfer_ownership(
    config: &Config,
    service: &MintService,
    new_owner: &str,
    yes: bool,
) -> error::Result<()> {
    if !yes && !utils::confirm_action(&format!("Transfer ownership to {}?", new_owner)) {
        println!("Cancelled");
        return Ok(());
    }
    let owner = service.owner().await;
    report(config, service.transfer_ownership(&owner, new_owner).await).await
}

async fn show_stats(service: &MintService, format: OutputFormat) -> error::Result<()> {
    let stats = service.stats().await?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", "=== FID Mint Statistics ===".cyan().bold());
    println!("\nMints:");
    println!("  Total:       {}", stats.total_minted);
    println!("  Pro:         {}", stats.pro_mints.to_string().green());
    println!("  Pro FIDs:    {}", stats.pro_fids);

    println!("\nRevenue:");
    println!("  Total:       {}", utils::format_eth(stats.total_revenue));
    println!("  Average:     {}", utils::format_eth(stats.avg_price()));

    println!("\nAdmin changes: {}", stats.parameter_changes);
    println!("Mirror size:   {}", service.mirror().len());

    let recent = service.recent_mints(10).await?;
    if !recent.is_empty() {
        println!("\n{}", "Recent Mints:".yellow());
        utils::print_table_border(80);
        utils::print_table_row(&["Minted At", "FID", "Token", "Price", "Pro"], &[24, 10, 8, 24, 4]);
        utils::print_table_border(80);

        for record in recent {
            utils::print_table_row(
                &[
                    &record.minted_at.as_ref().map(utils::format_timestamp).unwrap_or_default(),
                    &record.fid.to_string(),
                    &record.token_id.map(|t| format!("#{}", t)).unwrap_or_default(),
                    &record.price_paid.map(utils::wei_to_eth_string).unwrap_or_default(),
                    if record.is_pro { "yes" } else { "no" },
                ],
                &[24, 10, 8, 24, 4],
            );
        }
        utils::print_table_border(80);
    }

    Ok(())
}

async fn show_history(service: &MintService, limit: usize) -> error::Result<()> {
    let history = service.change_history(Some(limit)).await?;
    if history.is_empty() {
        println!("No parameter changes recorded");
        return Ok(());
    }

    println!("{}", "=== Parameter Changes ===".cyan().bold());
    utils::print_table_border(100);
    utils::print_table_row(&["Timestamp", "Action", "Detail", "Actor"], &[24, 30, 24, 16]);
    utils::print_table_border(100);
    for change in history {
        utils::print_table_row(
            &[
                &utils::format_timestamp(&change.timestamp),
                &change.action,
                &change.detail,
                &utils::format_address(&change.actor),
            ],
            &[24, 30, 24, 16],
        );
    }
    utils::print_table_border(100);

    Ok(())
}

async fn show_users(config: &Config, fids: &[u64]) -> error::Result<()> {
    let client = IdentityClient::new(&config.identity)?;
    if !client.is_configured() {
        warn!("identity.api_key is empty; the provider will likely reject lookups");
    }

    for (fid, result) in client.lookup_many(fids).await {
        match result {
            Ok(identity) => {
                println!("{}", format!("=== FID {} ===", fid).cyan().bold());
                println!("Username:  @{}", identity.username);
                println!("Name:      {}", identity.display_name);
                println!("Pro:       {}", if identity.is_pro { "yes".green() } else { "no".normal() });
                if let Some(custody) = &identity.custody_address {
                    println!("Custody:   {}", utils::format_address(custody));
                }
                for address in &identity.verified_addresses {
                    println!("Verified:  {}", utils::format_address(address));
                }
            }
            Err(e) => println!("{} FID {}: {}", "✗".red(), fid, e),
        }
    }

    Ok(())
}

async fn initialize(config: &Config, service: &MintService) -> error::Result<()> {
    println!("{}", "Initializing FID Mint...".green());
    println!("{}", "✓ Database initialized".green());
    println!("{}", "✓ Configuration loaded".green());

    let params = service.params().await;
    println!("\n{}", "Configuration:".cyan());
    println!("  Database:       {}", config.database.path);
    println!("  Owner:          {}", service.owner().await);
    println!(
        "  Oracle:         {}",
        service.oracle().await.unwrap_or_else(|| "(none)".to_string())
    );
    println!("  FID range:      {} - {}", params.min_fid, params.max_fid);
    println!("  Bind address:   {}", config.server.bind_address);
    println!("  Telegram:       {}", if config.telegram.is_some() { "enabled" } else { "disabled" });

    Ok(())
}
