// Compiler options ident injection.
//
// Loaders for virtual blocks reference the compiler's options by ident
// (`template-loader??vue-loader-options`), so the compiler entry of the
// component rule must carry that ident in an options object. The normalized
// entry and the raw rule are updated together: the raw rule is what the host
// normalizes again later, and it has to produce the same options bag.

use super::normalize::{chain_item_widths, split_chained_loader, NormalizedRule};
use crate::config::PluginSettings;
use crate::error::PluginError;
use crate::query::{parse_loader_query, split_loader_request};
use crate::types::*;
use serde_json::Value;
use tracing::debug;

/// The component rule after ident injection.
#[derive(Debug, Clone)]
pub struct InjectedRule {
    /// Raw rule to put back in the component rule's slot.
    pub rule: RawRule,
    /// Normalized chain with the compiler entry carrying the ident.
    pub use_entries: Vec<UseEntry>,
    /// Position of the compiler entry in `use_entries`.
    pub compiler_index: usize,
}

pub struct IdentInjector<'a> {
    settings: &'a PluginSettings,
}

impl<'a> IdentInjector<'a> {
    pub fn new(settings: &'a PluginSettings) -> Self {
        Self { settings }
    }

    pub fn inject(
        &self,
        index: usize,
        raw: &RawRule,
        normalized: &NormalizedRule,
    ) -> Result<InjectedRule, PluginError> {
        let compiler_index = normalized
            .use_entries
            .iter()
            .position(|entry| self.settings.compiler_loader.is_match(&entry.loader))
            .ok_or_else(|| PluginError::NoCompilerInUse {
                plugin: self.settings.plugin_name.clone(),
                loader: self.settings.compiler_loader_name.clone(),
                extension: self.settings.extension.clone(),
            })?;

        let Some(chain) = &raw.chain else {
            return Err(PluginError::UnreachableShorthand {
                plugin: self.settings.plugin_name.clone(),
                index,
            });
        };

        let widths = chain_item_widths(chain);
        if widths.iter().sum::<usize>() != normalized.use_entries.len() {
            return Err(PluginError::Misaligned {
                raw: widths.len(),
                normalized: normalized.use_entries.len(),
            });
        }

        let compiler = &normalized.use_entries[compiler_index];
        let options = self.options_with_ident(compiler.options.as_ref())?;
        debug!(
            index,
            compiler_index,
            shorthand = chain.source_name(),
            ident = %self.settings.ident,
            "attaching ident to compiler options"
        );

        let mut use_entries = normalized.use_entries.clone();
        use_entries[compiler_index].options = Some(LoaderOptions::Object(options.clone()));
        use_entries[compiler_index].ident = Some(self.settings.ident.clone());

        let rule = RawRule {
            chain: Some(rewrite_chain(chain, compiler_index, options)),
            ..raw.clone()
        };

        Ok(InjectedRule {
            rule,
            use_entries,
            compiler_index,
        })
    }

    fn options_with_ident(&self, existing: Option<&LoaderOptions>) -> Result<Options, PluginError> {
        let mut options = match existing {
            Some(LoaderOptions::Object(options)) => options.clone(),
            Some(LoaderOptions::Query(query)) => parse_loader_query(query)?,
            None => Options::new(),
        };
        options.insert(IDENT_KEY.to_string(), Value::String(self.settings.ident.clone()));
        Ok(options)
    }
}

fn rewrite_chain(chain: &LoaderShorthand, position: usize, options: Options) -> LoaderShorthand {
    match chain {
        LoaderShorthand::Loader { loader, options: existing } => {
            let parts = split_chained_loader(loader);
            if parts.len() > 1 {
                // a `!` chain cannot carry rule-level options
                let items = parts
                    .into_iter()
                    .map(|part| UseItem::Request(part.to_string()))
                    .collect();
                return LoaderShorthand::UseArray(attach_to_item(items, position, options));
            }
            // drops stray `!` separators like `vue-loader!`
            let single = parts.first().copied().unwrap_or(loader.as_str());
            let loader = match existing {
                Some(_) => single.to_string(),
                None => split_loader_request(single).0.to_string(),
            };
            LoaderShorthand::Loader {
                loader,
                options: Some(LoaderOptions::Object(options)),
            }
        }
        LoaderShorthand::LoaderList(items) => {
            LoaderShorthand::LoaderList(attach_to_item(items.clone(), position, options))
        }
        LoaderShorthand::UseArray(items) => {
            LoaderShorthand::UseArray(attach_to_item(items.clone(), position, options))
        }
    }
}

fn attach_to_item(mut items: Vec<UseItem>, position: usize, options: Options) -> Vec<UseItem> {
    let entry = match &items[position] {
        UseItem::Request(request) => UseEntry::new(split_loader_request(request).0),
        UseItem::Entry(entry) => UseEntry {
            ident: None,
            ..entry.clone()
        },
    };
    items[position] = UseItem::Entry(entry.with_options(options));
    items
}
