//! Builders for the JavaScript shipped into pages.
//!
//! Snippets are self-contained IIFEs returning JSON-serializable values,
//! so the page layer can decode them without knowing what was asked.

/// Embeds a string into a snippet as a JS string literal.
pub(crate) fn quote(value: &str) -> String {
    // Strings always serialize; the fallback is unreachable but keeps the
    // signature infallible.
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Collects every anchor URL under the given container selector, in
/// document order, as an array of absolute URLs.
pub fn collect_links_snippet(container_selector: &str) -> String {
    format!(
        r#"(() => {{
    const urls = [];
    document.querySelectorAll({sel}).forEach((container) => {{
        container.querySelectorAll("a[href]").forEach((a) => {{
            if (a.href) urls.push(a.href);
        }});
        if (container.tagName === "A" && container.href) urls.push(container.href);
    }});
    return urls;
}})()"#,
        sel = quote(container_selector)
    )
}

/// Reads the listing page's sections into one flat object of raw strings.
///
/// Labeled values are gathered from every definition list on the page;
/// the economy block is matched by its heading text so the free-text
/// amounts inside it survive verbatim for the regex layer.
pub fn listing_sections_snippet() -> String {
    r#"(() => {
    const labeled = {};
    document.querySelectorAll("dl").forEach((dl) => {
        const dts = dl.querySelectorAll("dt");
        const dds = dl.querySelectorAll("dd");
        for (let i = 0; i < dts.length && i < dds.length; i++) {
            const label = dts[i].innerText.trim();
            if (label) labeled[label] = dds[i].innerText.trim();
        }
    });
    const text = (sel) => {
        const el = document.querySelector(sel);
        return el ? el.innerText.trim() : "";
    };
    const sectionByHeading = (title) => {
        for (const heading of document.querySelectorAll("h2, h3")) {
            if (heading.innerText.trim().toLowerCase().startsWith(title)) {
                const section = heading.closest("section") || heading.parentElement;
                return section ? section.innerText : "";
            }
        }
        return "";
    };
    return {
        title: text("h1"),
        description: sectionByHeading("beskrivelse") || text("article"),
        area: labeled["Areal"] || "",
        energy: labeled["Energimærke"] || "",
        kind: labeled["Type"] || "",
        usage: labeled["Anvendelse"] || "",
        economy: sectionByHeading("økonomi"),
        floor_area: labeled["Etageareal"] || "",
        secondary_area: labeled["Sekundært areal"] || "",
        ground_area: labeled["Grundareal"] || "",
        facilities: sectionByHeading("faciliteter"),
        equipment: sectionByHeading("tekniske installationer"),
    };
})()"#
        .to_string()
}
