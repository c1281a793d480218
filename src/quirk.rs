// Vendor name normalization
// Hardware reports vendors in many spellings; clients want one display name.

/// Exact-prefix replacements, checked in order
const VENDOR_PREFIXES: &[(&str, &str)] = &[
    ("Acer, inc.", "Acer"),
    ("Acer Technologies", "Acer"),
    ("AOC Intl", "AOC"),
    ("Apple Computer Inc", "Apple"),
    ("Arnos Insturments & Computer Systems", "Arnos"),
    ("ASUSTeK Computer Inc.", "ASUSTeK"),
    ("ASUSTeK Computer INC", "ASUSTeK"),
    ("ASUSTeK COMPUTER INC.", "ASUSTeK"),
    ("BTC Korea Co., Ltd", "BTC"),
    ("CASIO COMPUTER CO.,LTD", "Casio"),
    ("CLEVO", "Clevo"),
    ("Delta Electronics", "Delta"),
    ("Eizo Nanao Corporation", "Eizo"),
    ("Envision Peripherals,", "Envision"),
    ("FUJITSU", "Fujitsu"),
    ("Fujitsu Siemens Computers GmbH", "Fujitsu Siemens"),
    ("Funai Electric Co., Ltd.", "Funai"),
    ("Gigabyte Technology Co., Ltd.", "Gigabyte"),
    ("Goldstar Company Ltd", "LG"),
    ("Hewlett-Packard", "Hewlett Packard"),
    ("Hitachi America Ltd", "Hitachi"),
    ("HP", "Hewlett Packard"),
    ("HWP", "Hewlett Packard"),
    ("IBM France", "IBM"),
    ("Lenovo Group Limited", "Lenovo"),
    ("LENOVO", "Lenovo"),
    ("Liyama North America", "Iiyama"),
    ("MARANTZ JAPAN, INC.", "Marantz"),
    ("Mitsubishi Electric Corporation", "Mitsubishi"),
    ("Nexgen Mediatech Inc.,", "Nexgen Mediatech"),
    ("NIKON", "Nikon"),
    ("Panasonic Industry Company", "Panasonic"),
    ("Philips Consumer Electronics Company", "Philips"),
    ("RGB Systems, Inc. dba Extron Electronics", "Extron"),
    ("SAM", "Samsung"),
    ("Samsung Electric Company", "Samsung"),
    ("Samsung Electronics America", "Samsung"),
    ("samsung", "Samsung"),
    ("SAMSUNG", "Samsung"),
    ("Sanyo Electric Co.,Ltd.", "Sanyo"),
    ("Sonix Technology Co.", "Sonix"),
    ("System manufacturer", "Unknown"),
    ("To Be Filled By O.E.M.", "Unknown"),
    ("Toshiba America Info Systems Inc", "Toshiba"),
    ("Toshiba Matsushita Display Technology Co.,", "Toshiba"),
    ("TOSHIBA", "Toshiba"),
    ("Unknown vendor", "Unknown"),
    ("Westinghouse Digital Electronics", "Westinghouse Digital"),
    ("Zalman Tech Co., Ltd.", "Zalman"),
];

/// Corporate suffixes removed from whatever is left
const VENDOR_SUFFIXES: &[&str] = &[
    "Co.",
    "Co",
    "Inc.",
    "Inc",
    "Ltd.",
    "Ltd",
    "Corporation",
    "Incorporated",
    "Limited",
    "GmbH",
    "corp.",
];

/// Return the display name for a raw vendor string
pub fn vendor_name(vendor: &str) -> String {
    for (prefix, name) in VENDOR_PREFIXES {
        if vendor.starts_with(prefix) {
            return name.to_string();
        }
    }

    let mut out = vendor.to_string();
    for suffix in VENDOR_SUFFIXES {
        if out.ends_with(suffix) {
            out.truncate(out.len() - suffix.len());
        }
    }
    out.trim_end().to_string()
}
