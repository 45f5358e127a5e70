use crate::error::Result;
use crate::ingestion::{ACCOUNT_NAME_HEADER, CATEGORY_HEADER};
use crate::schema::{AccountCategory, AccountLine, MonthlyValues};
use crate::summary::{recorded_value, SummaryBasis};
use crate::utils::MonthKey;
use serde::{Deserialize, Serialize};
use std::io::Write;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// `Jul 2024`, the column label the CSV importer reads back.
pub fn month_column_label(month: MonthKey) -> String {
    format!(
        "{} {}",
        MONTH_ABBREVIATIONS[(month.month() - 1) as usize],
        month.year()
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub name: String,
    pub category: AccountCategory,
    pub is_manual: bool,
    /// Values of the chart's basis; months with nothing recorded are absent.
    pub values: MonthlyValues,
}

impl AccountEntry {
    pub fn total(&self) -> f64 {
        self.values.values().sum()
    }
}

/// Account lines grouped by category, sorted by name within each group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartOfAccounts {
    pub title: Option<String>,
    pub months: Vec<MonthKey>,
    pub basis: SummaryBasis,
    pub revenue: Vec<AccountEntry>,
    pub cost_of_sales: Vec<AccountEntry>,
    pub operating_expenses: Vec<AccountEntry>,
    pub other_income: Vec<AccountEntry>,
    pub other_expenses: Vec<AccountEntry>,
    pub unclassified: Vec<AccountEntry>,
}

impl ChartOfAccounts {
    pub fn from_lines(lines: &[AccountLine], months: &[MonthKey], basis: SummaryBasis) -> Self {
        let mut chart = Self {
            title: None,
            months: months.to_vec(),
            basis,
            revenue: Vec::new(),
            cost_of_sales: Vec::new(),
            operating_expenses: Vec::new(),
            other_income: Vec::new(),
            other_expenses: Vec::new(),
            unclassified: Vec::new(),
        };

        for line in lines {
            let values = months
                .iter()
                .filter_map(|m| recorded_value(line, *m, basis).map(|v| (*m, v)))
                .collect();

            chart.section_mut(line.category).push(AccountEntry {
                name: line.account_name.clone(),
                category: line.category,
                is_manual: line.is_manual,
                values,
            });
        }

        for category in AccountCategory::ALL {
            chart
                .section_mut(category)
                .sort_by(|a, b| a.name.cmp(&b.name));
        }

        chart
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn section(&self, category: AccountCategory) -> &[AccountEntry] {
        match category {
            AccountCategory::Revenue => &self.revenue,
            AccountCategory::CostOfSales => &self.cost_of_sales,
            AccountCategory::OperatingExpenses => &self.operating_expenses,
            AccountCategory::OtherIncome => &self.other_income,
            AccountCategory::OtherExpenses => &self.other_expenses,
            AccountCategory::Unclassified => &self.unclassified,
        }
    }

    fn section_mut(&mut self, category: AccountCategory) -> &mut Vec<AccountEntry> {
        match category {
            AccountCategory::Revenue => &mut self.revenue,
            AccountCategory::CostOfSales => &mut self.cost_of_sales,
            AccountCategory::OperatingExpenses => &mut self.operating_expenses,
            AccountCategory::OtherIncome => &mut self.other_income,
            AccountCategory::OtherExpenses => &mut self.other_expenses,
            AccountCategory::Unclassified => &mut self.unclassified,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &AccountEntry> {
        AccountCategory::ALL
            .into_iter()
            .flat_map(move |category| self.section(category).iter())
    }

    pub fn manual_accounts(&self) -> impl Iterator<Item = &AccountEntry> {
        self.entries().filter(|e| e.is_manual)
    }

    pub fn total_accounts(&self) -> usize {
        self.entries().count()
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Writes `Account Name,Category,Jan 2025,...`, the layout `import_pnl_csv` reads.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = vec![ACCOUNT_NAME_HEADER.to_string(), CATEGORY_HEADER.to_string()];
        header.extend(self.months.iter().map(|m| month_column_label(*m)));
        csv_writer.write_record(&header)?;

        for entry in self.entries() {
            let mut record = vec![entry.name.clone(), entry.category.label().to_string()];
            record.extend(self.months.iter().map(|m| {
                entry
                    .values
                    .get(m)
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            }));
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        match &self.title {
            Some(title) => output.push_str(&format!("# Chart of Accounts - {}\n\n", title)),
            None => output.push_str("# Chart of Accounts\n\n"),
        }

        if let (Some(first), Some(last)) = (self.months.first(), self.months.last()) {
            output.push_str(&format!(
                "**Period:** {} to {} ({:?})\n\n",
                first, last, self.basis
            ));
        }

        for category in AccountCategory::ALL {
            let section = self.section(category);
            if section.is_empty() {
                continue;
            }

            output.push_str(&format!("## {}\n\n", category));
            for entry in section {
                let manual_marker = if entry.is_manual { " **[MANUAL]**" } else { "" };
                output.push_str(&format!(
                    "- {}: {:.2}{}\n",
                    entry.name,
                    entry.total(),
                    manual_marker
                ));
            }
            output.push('\n');
        }

        output
    }
}
