use forecast_builder::{
    goal_variance, import_pnl_csv_str, parse_period_string, regenerate_forecast, rollup,
    save_new_version, ChartOfAccounts, DistributionMethod, ForecastDefinition,
    ForecastProcessor, ForecastRepository, ForecastSnapshot, ImportOptions, InMemoryRepository,
    LineModification, LineOverrides, MonthKey, RollupGranularity, SummaryBasis,
};

const PNL_EXPORT: &str = "\
Account Name,Category,Jul 2023,Aug 2023,Sep 2023,Oct 2023,Nov 2023,Dec 2023,Jan 2024,Feb 2024,Mar 2024,Apr 2024,May 2024,Jun 2024,Jul 2024,Aug 2024,Sep 2024
Coffee Sales,Revenue,\"$12,000\",\"$11,500\",\"$12,500\",\"$14,000\",\"$16,000\",\"$21,000\",\"$10,000\",\"$9,500\",\"$11,000\",\"$12,000\",\"$12,500\",\"$13,000\",\"$13,500\",\"$13,000\",\"$14,000\"
Catering,Income,2000,1500,2500,3000,4500,8000,1000,1000,1500,2000,2500,3000,2500,2000,3000
Total Revenue,Revenue,14000,13000,15000,17000,20500,29000,11000,10500,12500,14000,15000,16000,16000,15000,17000
Beans & Milk,COGS,(4200),(3900),(4500),(5100),(6100),(8700),(3300),(3100),(3700),(4200),(4500),(4800),(4800),(4500),(5100)
Wages,Operating Expenses,6000,6000,6000,6000,6500,7500,6000,6000,6000,6000,6000,6000,6200,6200,6200
Rent,Operating Expenses,2500,2500,2500,2500,2500,2500,2500,2500,2500,2500,2500,2500,2600,2600,2600
Loyalty App,Software,120,120,120,120,120,120,120,120,120,120,120,120,120,120,120
";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("☕ Forecast walkthrough: The Daily Grind (FY ends June)\n");

    let lines = import_pnl_csv_str(PNL_EXPORT, &ImportOptions::default())?;
    println!("✅ Imported {} account lines", lines.len());

    let mut definition = ForecastDefinition::new(
        "daily-grind",
        2025,
        parse_period_string("2023-07:2024-06")?,
        parse_period_string("2024-10:2025-06")?,
    )
    .with_actual_period(parse_period_string("2024-07:2024-09")?);
    definition.fiscal_year_end_month = 6;
    definition.revenue_goal = Some(220_000.0);
    definition.gross_profit_goal = Some(150_000.0);
    definition.net_profit_goal = Some(40_000.0);
    definition.opex_budget = Some(105_000.0);
    definition.cogs_percentage = 0.3;
    definition.distribution_method = DistributionMethod::SeasonalPattern;

    // The owner has already signed a rent increase for the rest of the year.
    let rent_months = parse_period_string("2024-10:2025-06")?.months();
    let overrides = LineOverrides {
        modifications: rent_months
            .iter()
            .map(|month| LineModification::SetForecastValue {
                target: "Rent".to_string(),
                month: *month,
                value: 2_750.0,
            })
            .collect(),
        ..Default::default()
    };

    let run = ForecastProcessor::process_with_overrides(&definition, &lines, &overrides)?;

    println!("\n📋 Reconciliation");
    for reconciliation in &run.reconciliations {
        println!(
            "  {:<20} goal {:>12.2}  YTD {:>12.2}  remaining {:>12.2}{}",
            reconciliation.category.to_string(),
            reconciliation.goal,
            reconciliation.ytd_actual,
            reconciliation.remaining,
            if reconciliation.goal_met { "  (met)" } else { "" }
        );
    }

    if !run.warnings.is_empty() {
        println!("\n⚠️  Warnings");
        for warning in &run.warnings {
            println!("  - {}", warning);
        }
    }

    let mut fiscal_year = definition
        .actual()
        .map(|range| range.months())
        .unwrap_or_default();
    fiscal_year.extend(definition.forecast().months());

    println!("\n📈 Fiscal quarters (actuals where recorded, otherwise forecast)");
    let quarters = rollup(
        &run.lines,
        &fiscal_year,
        SummaryBasis::Combined,
        RollupGranularity::Quarter,
        definition.fiscal_year_end_month,
    );
    for (label, summary) in &quarters {
        println!(
            "  {:<10} revenue {:>11.2}  gross {:>11.2} ({:>5.1}%)  net {:>11.2} ({:>5.1}%)",
            label.to_string(),
            summary.revenue,
            summary.gross_profit,
            summary.gross_margin_pct,
            summary.net_profit,
            summary.net_margin_pct
        );
    }

    println!("\n🎯 Goal variance");
    let report = goal_variance(&definition, &run.lines);
    for (name, variance) in [
        ("Revenue", report.revenue),
        ("Gross profit", report.gross_profit),
        ("Net profit", report.net_profit),
    ] {
        if let Some(variance) = variance {
            println!(
                "  {:<13} goal {:>12.2}  projected {:>12.2}  variance {:>+11.2}",
                name, variance.goal, variance.projected, variance.variance
            );
        }
    }

    let chart = ChartOfAccounts::from_lines(&run.lines, &fiscal_year, SummaryBasis::Combined)
        .with_title("The Daily Grind FY2025");
    println!("\n{}", chart.to_markdown());

    // Persist, raise the revenue goal in a new version, and regenerate it.
    let mut repository = InMemoryRepository::new();
    ForecastSnapshot {
        definition: definition.clone(),
        lines: run.lines.clone(),
    }
    .store(&mut repository)?;

    let revised = save_new_version(&mut repository, &definition.id, |next| {
        next.revenue_goal = Some(240_000.0);
    })?;
    let revised_run = regenerate_forecast(&mut repository, &revised.id)?;

    let october = MonthKey::parse("2024-10")?;
    let coffee = |lines: &[forecast_builder::AccountLine]| {
        lines
            .iter()
            .find(|line| line.account_name == "Coffee Sales")
            .map(|line| line.forecast(october))
            .unwrap_or(0.0)
    };
    println!(
        "🔁 Version {} raises October coffee sales from {:.2} to {:.2}",
        revised.version,
        coffee(&run.lines),
        coffee(&revised_run.lines)
    );
    println!(
        "   Version chain: {}",
        repository
            .version_chain(&revised.id)?
            .iter()
            .map(|d| format!("v{}", d.version))
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    let snapshot_path = std::env::temp_dir().join("daily-grind-forecast.json");
    ForecastSnapshot::load(&repository, &revised.id)?.save_to(&snapshot_path)?;
    println!("💾 Saved snapshot to {}", snapshot_path.display());

    println!("\n📤 P&L export\n{}", chart.to_csv()?);

    Ok(())
}
