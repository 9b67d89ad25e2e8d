use scraper::{Html, Selector};
use tracing::info;

use crate::error::ProviderError;

const TECH500_URL: &str = "https://datarecrutement.fr/actualites/nos-actualites/tech500/";
const ROW_SELECTOR: &str = "table#tablepress-9 > tbody > tr";
const NAME_SELECTOR: &str = "td:nth-child(2)";

/// The yearly "Tech 500" ranking of French start-ups and scale-ups, used to
/// seed the company table.
pub struct Tech500Source {
    client: reqwest::Client,
}

impl Tech500Source {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn fetch_names(&self) -> Result<Vec<String>, ProviderError> {
        info!(url = TECH500_URL, "Fetching top 500 companies");
        let html = self
            .client
            .get(TECH500_URL)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(parse_names(&html))
    }
}

fn parse_names(html: &str) -> Vec<String> {
    let (Ok(rows), Ok(cell)) = (Selector::parse(ROW_SELECTOR), Selector::parse(NAME_SELECTOR)) else {
        return vec![];
    };

    let document = Html::parse_document(html);
    let mut names: Vec<String> = document
        .select(&rows)
        .filter_map(|row| row.select(&cell).next())
        .map(|td| td.text().collect::<String>().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_reads_second_column() {
        let html = r#"
            <table id="tablepress-9">
              <thead><tr><th>Rang</th><th>Entreprise</th></tr></thead>
              <tbody>
                <tr><td>1</td><td> Doctolib </td><td>Santé</td></tr>
                <tr><td>2</td><td>Qonto</td><td>Fintech</td></tr>
                <tr><td>3</td><td></td><td>?</td></tr>
                <tr><td>4</td><td>Back Market</td><td>E-commerce</td></tr>
              </tbody>
            </table>
            <table id="other"><tbody><tr><td>9</td><td>Ignored</td></tr></tbody></table>
        "#;

        assert_eq!(parse_names(html), vec!["Doctolib", "Qonto", "Back Market"]);
    }

    #[test]
    fn test_parse_names_without_table() {
        assert!(parse_names("<p>Page moved</p>").is_empty());
    }
}
