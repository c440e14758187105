// ==========================================
// Internationalization (i18n)
// ==========================================
// rust-i18n, locales/pt-BR.yml (default) and locales/en.yml
// Covers operator-facing text: validation labels, stage names,
// management labels for display, CLI messages
// ==========================================
// Note: the rust_i18n::i18n! macro is invoked in lib.rs
// ==========================================

/// Default operator locale
pub const DEFAULT_LOCALE: &str = "pt-BR";

/// Current locale
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// Switch locale ("pt-BR" or "en")
pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// Translate a key
///
/// # Example
/// ```no_run
/// use talhao_apex::i18n::t;
/// let msg = t("validation.area_missing");
/// ```
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// Translate a key and substitute `%{name}` placeholders
///
/// # Example
/// ```no_run
/// use talhao_apex::i18n::t_with_args;
/// let msg = t_with_args("import.file_not_found", &[("path", "/tmp/IFC.csv")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}

/// Display text of a pipeline stage (`consist.*` / `manejo.*`)
pub fn stage_label(stage: &str) -> String {
    t(&format!("stage.{}", stage))
}
