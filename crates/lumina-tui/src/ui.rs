use lumina_core::{format_price, ChatRole, Product, Provider, ViewState, CATEGORIES};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::app::{App, ChatFocus, CheckoutField, InputMode};

const ACCENT: Color = Color::Yellow;

/// Ensure the selected item in a list is visible by adjusting the ListState offset.
fn ensure_selected_visible(state: &mut ListState, visible_height: usize) {
    let visible_height = visible_height.max(1);

    if let Some(selected) = state.selected() {
        let min_offset = selected.saturating_sub(visible_height - 1);
        let max_offset = selected;

        let new_offset = state.offset().clamp(min_offset, max_offset);
        if new_offset != state.offset() {
            *state.offset_mut() = new_offset;
        }
    }
}

/// Visible window of `input` that keeps the cursor on screen, and the
/// cursor's column within it.
fn scrolled_input(input: &str, cursor: usize, width: usize) -> (String, u16) {
    let offset = if width > 0 && cursor >= width {
        cursor - width + 1
    } else {
        0
    };
    let visible = input.chars().skip(offset).take(width).collect();
    (visible, (cursor - offset) as u16)
}

fn rating_line(product: &Product) -> Span<'static> {
    Span::styled(
        format!("★ {:.1} ({} reviews)", product.rating, product.reviews),
        Style::default().fg(ACCENT),
    )
}

fn product_item(product: &Product) -> ListItem<'static> {
    ListItem::new(Line::from(vec![
        Span::styled(format!("{} ", product.brand), Style::default().fg(Color::DarkGray)),
        Span::styled(product.name.clone(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(format_price(product.price), Style::default().fg(Color::Green)),
    ]))
}

fn highlighted_list<'a>(items: Vec<ListItem<'a>>, block: Block<'a>) -> List<'a> {
    List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ")
}

fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    Rect::new(
        area.x + (area.width.saturating_sub(width)) / 2,
        area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    )
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.view {
        ViewState::Home => render_home(app, frame, body_area),
        ViewState::Shop => render_shop(app, frame, body_area),
        ViewState::ProductDetails => render_product(app, frame, body_area),
        ViewState::Cart => render_cart(app, frame, body_area),
        ViewState::Checkout => render_checkout(app, frame, body_area),
    }

    if app.chat_open {
        render_chat(app, frame, body_area);
    }

    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if app.show_api_key_input {
        render_api_key_input(app, frame, area);
    } else if app.show_provider_picker {
        render_provider_picker(app, frame, area);
    } else if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let bag = if app.cart.is_empty() {
        " Bag empty ".to_string()
    } else {
        format!(
            " Bag: {} · {} ",
            app.cart.item_count(),
            format_price(app.cart.total())
        )
    };

    let title = Line::from(vec![
        Span::styled(" LUMINA ", Style::default().fg(ACCENT).bold()),
        Span::styled(format!("{} ", app.view.title()), Style::default().fg(Color::White)),
        Span::styled(bag, Style::default().fg(Color::Green)),
        Span::styled(
            format!(
                " {}: {} ",
                app.assistant.provider().as_str(),
                app.assistant.model()
            ),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    if let Some(notice) = &app.notice {
        let line = Line::from(vec![
            Span::styled(" NOTICE ", Style::default().bg(ACCENT).fg(Color::Black)),
            Span::raw(" "),
            Span::raw(notice.as_str()),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        return;
    }

    let editing = app.input_mode == InputMode::Editing
        || (app.chat_open && app.chat_focus == ChatFocus::Input);
    let mode_style = if editing {
        Style::default().bg(Color::Yellow).fg(Color::Black)
    } else {
        Style::default().bg(Color::Blue).fg(Color::White)
    };
    let mode_text = if app.chat_open {
        " CONCIERGE "
    } else {
        match app.view {
            ViewState::Home => " HOME ",
            ViewState::Shop => " SHOP ",
            ViewState::ProductDetails => " PRODUCT ",
            ViewState::Cart => " BAG ",
            ViewState::Checkout => " CHECKOUT ",
        }
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [
            Span::styled(format!(" {} ", key), key_style),
            Span::styled(format!(" {} ", label), label_style),
        ]
    };

    let pairs: Vec<(&'static str, &'static str)> = if app.chat_open {
        match app.chat_focus {
            ChatFocus::Input => vec![
                ("Enter", "send"),
                ("↑/↓", "scroll"),
                ("Tab", "picks"),
                ("Esc", "close"),
            ],
            ChatFocus::Recommendations => vec![
                ("j/k", "nav"),
                ("Enter", "view product"),
                ("Tab", "message"),
                ("Esc", "back"),
            ],
        }
    } else {
        let mut pairs = match (app.view, app.input_mode) {
            (ViewState::Shop, InputMode::Editing) => vec![("Enter", "apply"), ("Esc", "done")],
            (ViewState::Checkout, InputMode::Editing) => {
                vec![("Tab", "next field"), ("Enter/Esc", "done")]
            }
            (ViewState::Home, _) => vec![("j/k", "nav"), ("Enter", "view"), ("s", "shop")],
            (ViewState::Shop, _) => vec![
                ("j/k", "nav"),
                ("h/l", "category"),
                ("/", "search"),
                ("Enter", "view"),
            ],
            (ViewState::ProductDetails, _) => vec![("Enter", "add to bag"), ("Esc", "back")],
            (ViewState::Cart, _) => vec![
                ("j/k", "nav"),
                ("d", "remove"),
                ("o", "open"),
                ("Enter", "checkout"),
            ],
            (ViewState::Checkout, _) => vec![
                ("j/k", "field"),
                ("Enter", "edit"),
                ("p", "pay"),
                ("Esc", "bag"),
            ],
        };
        if app.input_mode == InputMode::Normal {
            pairs.extend([
                ("1/2/3", "home/shop/bag"),
                ("a", "concierge"),
                ("P", "provider"),
                ("M", "model"),
                ("q", "quit"),
            ]);
        }
        pairs
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    for (key, label) in pairs {
        spans.extend(hint(key, label));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_home(app: &mut App, frame: &mut Frame, area: Rect) {
    let [hero_area, featured_area, vendors_area] = Layout::vertical([
        Constraint::Length(6),
        Constraint::Length(FEATURED_HEIGHT),
        Constraint::Min(0),
    ])
    .areas(area);

    let hero = Paragraph::new(Text::from(vec![
        Line::from(Span::styled(
            "Curated luxury, delivered.",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from("Timepieces, cameras, design icons and travel essentials from verified houses."),
        Line::from(Span::styled(
            "Press 2 to explore the collection or a to ask the concierge.",
            Style::default().fg(Color::DarkGray),
        )),
    ]))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(ACCENT)));
    frame.render_widget(hero, hero_area);

    let items: Vec<ListItem> = app.featured().iter().map(product_item).collect();
    let featured = highlighted_list(
        items,
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Featured "),
    );
    frame.render_stateful_widget(featured, featured_area, &mut app.featured_state);

    let vendors: Vec<ListItem> = app
        .catalog
        .vendors()
        .into_iter()
        .map(|vendor| {
            let mut spans = vec![Span::styled(
                vendor.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )];
            if vendor.verified {
                spans.push(Span::styled(" ✓ verified", Style::default().fg(Color::Green)));
            }
            spans.push(Span::styled(
                format!("  ★ {:.1}", vendor.rating),
                Style::default().fg(ACCENT),
            ));
            ListItem::new(Line::from(spans))
        })
        .collect();
    let vendors = List::new(vendors).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Vendor spotlight "),
    );
    frame.render_widget(vendors, vendors_area);
}

const FEATURED_HEIGHT: u16 = crate::app::FEATURED_COUNT as u16 + 2;

fn render_shop(app: &mut App, frame: &mut Frame, area: Rect) {
    let [tabs_area, search_area, body_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    let tabs = Tabs::new(CATEGORIES.iter().map(|c| Line::from(*c)).collect::<Vec<_>>())
        .select(app.category_idx)
        .block(Block::default().borders(Borders::ALL).title(" Categories "))
        .highlight_style(Style::default().fg(Color::Black).bg(ACCENT).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, tabs_area);

    let editing = app.input_mode == InputMode::Editing;
    let search_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(" Search (/) ");
    let search_text = if app.search_input.is_empty() && !editing {
        Span::styled("Search the collection...", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(app.search_input.clone(), Style::default().fg(Color::Cyan))
    };
    frame.render_widget(Paragraph::new(search_text).block(search_block), search_area);
    if editing {
        let inner_width = search_area.width.saturating_sub(2) as usize;
        let (_, cursor_x) =
            scrolled_input(&app.search_input, app.search_input.chars().count(), inner_width);
        frame.set_cursor_position((search_area.x + cursor_x + 1, search_area.y + 1));
    }

    let [list_area, preview_area] =
        Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(body_area);

    let count = app.shop_results.len();
    let title = format!(
        " {} · {} {} ",
        app.current_category(),
        count,
        if count == 1 { "product" } else { "products" }
    );
    let items: Vec<ListItem> = app.shop_results.iter().map(product_item).collect();
    let list = highlighted_list(
        items,
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(title),
    );
    ensure_selected_visible(&mut app.shop_state, list_area.height.saturating_sub(2) as usize);
    frame.render_stateful_widget(list, list_area, &mut app.shop_state);

    let preview_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Preview ");
    let selected = app.shop_state.selected().and_then(|i| app.shop_results.get(i));
    let preview = match selected {
        Some(product) => Text::from(vec![
            Line::from(Span::styled(product.name.clone(), Style::default().bold())),
            Line::from(Span::styled(product.brand.clone(), Style::default().fg(Color::DarkGray))),
            Line::from(rating_line(product)),
            Line::default(),
            Line::from(product.description.clone()),
        ]),
        None => Text::from(Span::styled(
            "No products match. Try another category or search.",
            Style::default().fg(Color::DarkGray),
        )),
    };
    frame.render_widget(
        Paragraph::new(preview).block(preview_block).wrap(Wrap { trim: true }),
        preview_area,
    );
}

fn render_product(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Product Details ");

    let Some(product) = &app.selected_product else {
        frame.render_widget(
            Paragraph::new("No product selected.").block(block),
            area,
        );
        return;
    };

    let in_bag = app
        .cart
        .items()
        .iter()
        .find(|item| item.product.id == product.id)
        .map_or(0, |item| item.quantity);

    let mut vendor = vec![
        Span::raw("Sold by "),
        Span::styled(product.vendor.name.clone(), Style::default().bold()),
    ];
    if product.vendor.verified {
        vendor.push(Span::styled(" ✓ verified", Style::default().fg(Color::Green)));
    }
    vendor.push(Span::styled(
        format!("  ★ {:.1}", product.vendor.rating),
        Style::default().fg(ACCENT),
    ));

    let mut lines = vec![
        Line::from(Span::styled(
            product.brand.to_uppercase(),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(Span::styled(
            product.name.clone(),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled(format_price(product.price), Style::default().fg(Color::Green).bold()),
            Span::raw("   "),
            rating_line(product),
        ]),
        Line::from(vendor),
        Line::default(),
        Line::from(product.description.clone()),
        Line::default(),
        Line::from(Span::styled("Features", Style::default().bold())),
    ];
    lines.extend(
        product
            .features
            .iter()
            .map(|feature| Line::from(format!("  • {}", feature))),
    );
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        format!("Category: {}", product.category),
        Style::default().fg(Color::DarkGray),
    )));
    lines.push(Line::from(Span::styled(
        product.image.clone(),
        Style::default().fg(Color::DarkGray),
    )));
    if in_bag > 0 {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            format!("{} in your bag", in_bag),
            Style::default().fg(Color::Cyan),
        )));
    }

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn order_summary(app: &App) -> Vec<Line<'static>> {
    let total = format_price(app.cart.total());
    vec![
        Line::from(vec![
            Span::raw("Subtotal   "),
            Span::styled(total.clone(), Style::default().bold()),
        ]),
        Line::from(vec![
            Span::raw("Shipping   "),
            Span::styled("Complimentary", Style::default().fg(Color::Green)),
        ]),
        Line::default(),
        Line::from(vec![
            Span::styled("Total      ", Style::default().bold()),
            Span::styled(total, Style::default().fg(ACCENT).bold()),
        ]),
    ]
}

fn render_cart(app: &mut App, frame: &mut Frame, area: Rect) {
    if app.cart.is_empty() {
        let empty = Paragraph::new(Text::from(vec![
            Line::default(),
            Line::from(Span::styled("Your bag is empty.", Style::default().bold())),
            Line::default(),
            Line::from(Span::styled(
                "Press Enter or 2 to continue shopping.",
                Style::default().fg(Color::DarkGray),
            )),
        ]))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(" Shopping Bag "));
        frame.render_widget(empty, area);
        return;
    }

    let [lines_area, summary_area] =
        Layout::horizontal([Constraint::Percentage(65), Constraint::Percentage(35)]).areas(area);

    let items: Vec<ListItem> = app
        .cart
        .items()
        .iter()
        .map(|item| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", item.product.brand), Style::default().fg(Color::DarkGray)),
                Span::styled(item.product.name.clone(), Style::default().bold()),
                Span::raw(format!("  × {}  ", item.quantity)),
                Span::styled(format_price(item.line_total()), Style::default().fg(Color::Green)),
            ]))
        })
        .collect();
    let list = highlighted_list(
        items,
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(format!(" Shopping Bag ({}) ", app.cart.item_count())),
    );
    ensure_selected_visible(&mut app.cart_state, lines_area.height.saturating_sub(2) as usize);
    frame.render_stateful_widget(list, lines_area, &mut app.cart_state);

    let mut summary = order_summary(app);
    summary.push(Line::default());
    summary.push(Line::from(Span::styled(
        "Enter: proceed to checkout",
        Style::default().fg(Color::DarkGray),
    )));
    frame.render_widget(
        Paragraph::new(summary).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .title(" Order Summary "),
        ),
        summary_area,
    );
}

fn render_checkout(app: &App, frame: &mut Frame, area: Rect) {
    let [form_area, summary_area] =
        Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(area);

    let editing = app.input_mode == InputMode::Editing;
    let form_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::Cyan }))
        .title(" Secure Checkout ");
    let inner = form_block.inner(form_area);
    frame.render_widget(form_block, form_area);

    let label_width = 13;
    let mut lines = Vec::new();
    let mut cursor = None;
    for (row, field) in CheckoutField::ALL.iter().enumerate() {
        let focused = app.checkout.focused == row;
        let value = app.checkout.value(*field);
        let shown = if field.is_secret() {
            "•".repeat(value.chars().count())
        } else {
            value.to_string()
        };

        let label_style = if focused {
            Style::default().fg(ACCENT).bold()
        } else {
            Style::default().fg(Color::Gray)
        };
        let value_span = if value.is_empty() && !(focused && editing) {
            Span::styled(field.placeholder(), Style::default().fg(Color::DarkGray))
        } else {
            Span::styled(shown.clone(), Style::default().fg(Color::Cyan))
        };

        lines.push(Line::from(vec![
            Span::styled(if focused { "> " } else { "  " }, label_style),
            Span::styled(format!("{:<width$}", field.label(), width = label_width), label_style),
            value_span,
        ]));
        if focused && editing {
            cursor = Some((2 + label_width + shown.chars().count()) as u16);
        }
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Details stay on this device. No payment is processed.",
        Style::default().fg(Color::DarkGray),
    )));
    frame.render_widget(Paragraph::new(lines), inner);

    if let Some(x) = cursor {
        let row = app.checkout.focused as u16;
        frame.set_cursor_position((inner.x + x.min(inner.width.saturating_sub(1)), inner.y + row));
    }

    let mut summary: Vec<Line> = app
        .cart
        .items()
        .iter()
        .map(|item| {
            Line::from(format!(
                "{} × {}  {}",
                item.product.name,
                item.quantity,
                format_price(item.line_total())
            ))
        })
        .collect();
    summary.push(Line::default());
    summary.extend(order_summary(app));
    summary.push(Line::default());
    summary.push(Line::from(Span::styled(
        format!(" PAY {} ", format_price(app.cart.total())),
        Style::default().bg(ACCENT).fg(Color::Black).bold(),
    )));
    summary.push(Line::from(Span::styled("press p", Style::default().fg(Color::DarkGray))));

    frame.render_widget(
        Paragraph::new(summary)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(ACCENT))
                    .title(" Your Order "),
            ),
        summary_area,
    );
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let width = (area.width / 2).max(44).min(area.width);
    let panel = Rect::new(area.x + area.width - width, area.y, width, area.height);
    frame.render_widget(Clear, panel);

    let recommendation_count = app.recommendations().len();
    let recs_height = if recommendation_count == 0 {
        0
    } else {
        (recommendation_count.min(5) + 2) as u16
    };
    let [chat_area, recs_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(recs_height),
        Constraint::Length(3),
    ])
    .areas(panel);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let queued = app.queued_turns.len();
    let mut title = format!(
        " Lumina Concierge · {}: {} ",
        app.assistant.provider().as_str(),
        app.assistant.model()
    );
    if queued > 0 {
        title.push_str(&format!("({} queued) ", queued));
    }
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT))
        .title(title);

    let transcript = app.assistant.transcript();
    let mut lines: Vec<Line> = Vec::new();
    if transcript.is_empty() {
        lines.push(Line::from(Span::styled(
            lumina_core::WELCOME_MESSAGE,
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
        lines.push(Line::default());
    }
    for msg in transcript.messages() {
        match msg.role {
            ChatRole::User => lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ))),
            ChatRole::Assistant => lines.push(Line::from(Span::styled(
                "Lumina:",
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
            ))),
        }
        for line in msg.text.lines() {
            lines.push(Line::from(line.to_string()));
        }
        for product in &msg.products {
            lines.push(Line::from(vec![
                Span::styled("  ◆ ", Style::default().fg(Color::Magenta)),
                Span::styled(format!("{} ", product.brand), Style::default().fg(Color::DarkGray)),
                Span::styled(product.name.clone(), Style::default().fg(Color::Magenta).bold()),
            ]));
        }
        lines.push(Line::default());
    }

    if app.is_chat_loading() {
        lines.push(Line::from(Span::styled(
            "Lumina:",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let chat = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: true });
    let rows = u16::try_from(chat.line_count(app.chat_width)).unwrap_or(u16::MAX);
    let bottom = rows.saturating_sub(app.chat_height);
    if app.chat_follow || app.chat_scroll >= bottom {
        app.chat_scroll = bottom;
        app.chat_follow = true;
    }
    let chat = chat.block(chat_block).scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    if recs_height > 0 {
        let recs_focused = app.chat_focus == ChatFocus::Recommendations;
        let items: Vec<ListItem> = app
            .recommendations()
            .into_iter()
            .map(|product| {
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{} {}  ", product.brand, product.name)),
                    Span::styled(format_price(product.price), Style::default().fg(Color::Green)),
                ]))
            })
            .collect();
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(if recs_focused { Color::Cyan } else { Color::Magenta }))
                    .title(" Recommendations (Tab, Enter to view) "),
            )
            .highlight_style(
                Style::default()
                    .bg(Color::Magenta)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");
        ensure_selected_visible(&mut app.recommendation_state, recs_area.height.saturating_sub(2) as usize);
        frame.render_stateful_widget(list, recs_area, &mut app.recommendation_state);
    }

    let input_focused = app.chat_focus == ChatFocus::Input;
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if input_focused { Color::Yellow } else { Color::DarkGray }))
        .title(" Ask Lumina ");
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let (visible, cursor_x) = scrolled_input(&app.chat_input, app.chat_cursor, inner_width);
    frame.render_widget(
        Paragraph::new(visible)
            .style(Style::default().fg(Color::Cyan))
            .block(input_block),
        input_area,
    );
    if input_focused {
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup = popup_area(area, 44, app.available_models.len() as u16 + 2);
    frame.render_widget(Clear, popup);

    let current = app.assistant.model();
    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|model| {
            let style = if model == current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", model)).style(style)
        })
        .collect();

    let list = highlighted_list(
        items,
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Select Model (Enter to select, Esc to cancel) "),
    );
    frame.render_stateful_widget(list, popup, &mut app.model_picker_state);
}

fn render_provider_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let providers = Provider::all();
    let popup = popup_area(area, 45, providers.len() as u16 + 2);
    frame.render_widget(Clear, popup);

    let items: Vec<ListItem> = providers
        .iter()
        .map(|provider| {
            let key_source = app.get_key_source(*provider);
            let is_current = *provider == app.assistant.provider();

            let status = match key_source {
                Some("env") => "(env var)",
                Some("config") => "(configured)",
                Some("local") => "(local)",
                _ => "(needs key)",
            };
            let prefix = if is_current { "* " } else { "  " };

            let style = if is_current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else if key_source.is_some() {
                Style::default()
            } else {
                Style::default().fg(Color::DarkGray)
            };

            ListItem::new(format!("{}{} {}", prefix, provider.display_name(), status)).style(style)
        })
        .collect();

    let list = highlighted_list(
        items,
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Select Provider "),
    );
    frame.render_stateful_widget(list, popup, &mut app.provider_picker_state);
}

fn render_api_key_input(app: &App, frame: &mut Frame, area: Rect) {
    let provider_name = app
        .api_key_target_provider
        .map(|p| p.display_name())
        .unwrap_or("Provider");

    let popup = popup_area(area, 60, 7);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(format!(" Enter API Key for {} ", provider_name));
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let instructions = Paragraph::new("Paste your API key below. Press Enter to save, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    // Mask the key, showing only the last 4 characters
    let char_count = app.api_key_input.chars().count();
    let display_text = if char_count <= 4 {
        "*".repeat(char_count)
    } else {
        let masked_len = char_count - 4;
        let last_four: String = app.api_key_input.chars().skip(masked_len).collect();
        format!("{}...{}", "*".repeat(masked_len.min(20)), last_four)
    };

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    frame.render_widget(
        Paragraph::new(display_text).style(Style::default().fg(Color::Cyan)),
        input_area,
    );

    let cursor_x = app.api_key_input_cursor.min(input_area.width as usize) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));

    let status = Paragraph::new(format!("{} characters", char_count))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(status, Rect::new(inner.x, inner.y + 4, inner.width, 1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_core::{Catalog, ChatError, Config};
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    fn draw(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 32)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        let mut out = String::new();
        for row in buffer.content.chunks(width) {
            for cell in row {
                out.push_str(cell.symbol());
            }
            out.push('\n');
        }
        out
    }

    fn app() -> App {
        App::new(Arc::new(Catalog::builtin()), Config::new(), None)
    }

    fn fill_transcript(app: &mut App, turns: usize) {
        for i in 1..=turns {
            app.assistant.begin_turn(&format!("question {i}")).unwrap();
            app.assistant.complete_turn(Ok(format!(
                r#"{{"message":"Answer {i}: a considered suggestion that runs long enough to wrap across more than one row of the panel."}}"#
            )));
        }
    }

    #[test]
    fn test_scrolled_input_keeps_cursor_visible() {
        assert_eq!(scrolled_input("hello", 5, 10), ("hello".to_string(), 5));
        assert_eq!(scrolled_input("abcdefgh", 8, 4), ("fgh".to_string(), 3));
    }

    #[test]
    fn test_home_shows_featured_and_vendors() {
        let mut app = app();
        let screen = draw(&mut app);
        assert!(screen.contains("LUMINA"));
        assert!(screen.contains("Elysium Chronograph"));
        assert!(screen.contains("Vendor spotlight"));
        assert!(screen.contains("Bag empty"));
    }

    #[test]
    fn test_cart_and_checkout_screens() {
        let mut app = app();
        app.go_to(ViewState::Cart);
        assert!(draw(&mut app).contains("Your bag is empty."));

        app.open_product("1");
        app.add_selected_to_cart();
        app.go_to(ViewState::Checkout);
        let screen = draw(&mut app);
        assert!(screen.contains("Secure Checkout"));
        assert!(screen.contains("PAY $12,500"));
        assert!(screen.contains("Complimentary"));
    }

    #[test]
    fn test_chat_overlay_shows_welcome_then_cards() {
        let mut app = app();
        app.toggle_chat();
        assert!(draw(&mut app).contains("Welcome to Lumina."));

        app.assistant.begin_turn("a chair").unwrap();
        app.assistant.complete_turn(Ok(
            r#"{"message":"Sit back.","recommendedProductIds":["4"]}"#.to_string(),
        ));
        let screen = draw(&mut app);
        assert!(screen.contains("Sit back."));
        assert!(screen.contains("Recommendations"));
        assert!(screen.contains("Eames Lounge Chair"));
    }

    #[test]
    fn test_long_transcript_keeps_latest_reply_in_view() {
        let mut app = app();
        app.toggle_chat();
        fill_transcript(&mut app, 12);

        let screen = draw(&mut app);
        assert!(screen.contains("Answer 12:"));
        assert!(!screen.contains("Answer 1:"));
        assert!(!screen.contains("Welcome to Lumina."));

        app.chat_scroll_up(40);
        let screen = draw(&mut app);
        assert!(!app.chat_follow);
        assert!(!screen.contains("Answer 12:"));

        app.chat_scroll_down(u16::MAX);
        let screen = draw(&mut app);
        assert!(app.chat_follow);
        assert!(screen.contains("Answer 12:"));
    }

    #[tokio::test]
    async fn test_thinking_line_stays_below_long_transcript() {
        let mut app = app();
        app.toggle_chat();
        fill_transcript(&mut app, 12);
        app.chat_task = Some(tokio::spawn(std::future::pending::<Result<String, ChatError>>()));
        app.scroll_chat_to_bottom();

        assert!(draw(&mut app).contains("Thinking."));
    }
}
