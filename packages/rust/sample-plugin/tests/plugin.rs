use std::sync::Arc;

use markitup_core::{
    ConverterConfig, InventoryDiscovery, MarkItUp, PluginDiscovery, StaticDiscovery, StreamInfo,
    inspect_plugins,
};
use markitup_sample_plugin::{PLUGIN_NAME, SamplePlugin};

const SAMPLE_RTF: &[u8] = br"{\rtf1\ansi\deff0{\fonttbl{\f0 Times New Roman;}}
\pard\f0\fs24 This is a Sample RTF File\par
It is included to test if the MarkItUp sample plugin can correctly convert RTF files.\par
}";

fn plugins_enabled() -> ConverterConfig {
    ConverterConfig {
        enable_plugins: true,
        ..ConverterConfig::default()
    }
}

#[test]
fn linked_plugin_is_discovered() {
    let names: Vec<String> = InventoryDiscovery
        .discover()
        .iter()
        .map(|p| p.name().to_string())
        .collect();
    assert!(names.iter().any(|n| n == PLUGIN_NAME));
}

#[test]
fn enabled_plugins_convert_rtf() {
    let md = MarkItUp::new(plugins_enabled()).unwrap();
    assert!(md.converter_names().contains(&"rtf"));
    assert!(md.plugins().iter().any(|p| p.name == PLUGIN_NAME));

    let result = md
        .convert_bytes(SAMPLE_RTF, &StreamInfo::default().with_filename("test.rtf"))
        .unwrap();
    assert!(result.markdown.contains("This is a Sample RTF File"));
    assert!(result.markdown.contains(
        "It is included to test if the MarkItUp sample plugin can correctly convert RTF files."
    ));
    assert!(!result.markdown.contains("fonttbl"));
}

#[test]
fn disabled_plugins_leave_rtf_to_text_converters() {
    let md = MarkItUp::new(ConverterConfig::default()).unwrap();
    assert!(!md.converter_names().contains(&"rtf"));

    let result = md
        .convert_bytes(SAMPLE_RTF, &StreamInfo::default().with_filename("test.rtf"))
        .unwrap();
    assert!(result.markdown.contains("\\fonttbl"));
}

#[test]
fn explicit_discovery_and_inspection() {
    let discovery = StaticDiscovery::new(vec![Arc::new(SamplePlugin)]);
    let infos = inspect_plugins(&discovery, &ConverterConfig::default());
    assert_eq!(infos.len(), 1);
    assert!(infos[0].compatible);
    assert_eq!(infos[0].converters, ["rtf"]);

    let md = MarkItUp::with_discovery(ConverterConfig::default(), &discovery).unwrap();
    assert_eq!(md.converter_names().first(), Some(&"docx"));
    assert!(md.converter_names().contains(&"rtf"));
}
