//! `agora prompt` — Print the system prompt a request would use.

use agora_core::selector::PromptSelector;
use agora_persona::{PromptCatalog, TemplateKind};

pub fn run(figure: &str, mode: &str, topic: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = PromptCatalog::global();
    let mut selector = PromptSelector::new(figure, mode);
    selector.topic = topic.map(str::to_string);

    let kind = catalog.kind(&selector);
    if kind != TemplateKind::Catalog {
        let known: Vec<String> = catalog.figures().into_iter().map(|f| f.name).collect();
        eprintln!(
            "note: '{figure}' / '{mode}' is not in the catalog, using the {} template",
            kind.as_str()
        );
        eprintln!("      known figures: {}", known.join(", "));
    }

    println!("{}", catalog.resolve_selector(&selector));

    Ok(())
}
