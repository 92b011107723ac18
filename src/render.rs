use crate::models::popover::Popover;

/// Renders the overlay markup consumed by the client controller.
/// The controller relies on three hooks only: the `.popm-overlay` container
/// with its data attributes, the `.popm-close` control, and `.popm-content`.
pub fn overlay_html(popover: &Popover) -> String {
    let id = popover.id;
    let title = html_escape(&popover.title);
    let layout = popover.layout();

    let image = match &popover.featured_image {
        Some(src) => format!(
            "<div class=\"popm-image\"><img src=\"{}\" alt=\"{}\"></div>",
            html_escape(src),
            title
        ),
        None => String::new(),
    };

    let form = if popover.form_url.is_empty() {
        String::new()
    } else {
        format!(
            "<iframe class=\"popm-iframe\" src=\"{}\" frameborder=\"0\" allowfullscreen title=\"{}\"></iframe>",
            html_escape(&popover.form_url),
            title
        )
    };

    format!(
        "<div class=\"popm-overlay\" data-popover-id=\"{id}\" data-cookie-days=\"{days}\">\
<div class=\"popm-popup {layout}\" style=\"width: {width}; max-height: {max_height};\" role=\"dialog\" aria-modal=\"true\" aria-labelledby=\"popm-title-{id}\">\
<button class=\"popm-close\" aria-label=\"Close\">&times;</button>\
<span id=\"popm-title-{id}\" class=\"screen-reader-text\">{title}</span>\
{image}\
<div class=\"popm-content\">{form}</div>\
</div></div>",
        id = id,
        days = popover.cookie_days,
        layout = layout.css_class(),
        width = html_escape(&popover.width),
        max_height = html_escape(&popover.max_height),
        title = title,
        image = image,
        form = form,
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
