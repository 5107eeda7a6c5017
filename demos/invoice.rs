//! Invoice Example - an editable invoice / quotation / receipt document
//!
//! This example drives a complete document component through the runtime:
//! - Label dictionaries per language, merged per document type
//! - Editable header fields written back from `input` events
//! - Keyed line items with add and remove
//! - Due date and withholding lines shown per document type
//! - Derived totals (amounts, subtotal, VAT, withholding, adjustment)
//!
//! Every simulated user action is followed by one microtask drain, which
//! applies all of that action's changes in a single flush.
//!
//! Run with: cargo run --example invoice
//! Set RUST_LOG=spark_dom=debug to watch flushes and reconciliation.

use std::rc::Rc;

use serde_json::{json, Map, Value};
use spark_dom::{
    on_mount, Component, ComponentDef, ComponentOptions, DirtyMask, Dom, EachBlock, Fragment, IfBlock,
    Mutation, NodeId, NodeRef, Props, Result, Runtime, RuntimeConfig, Template, WeakComponent,
};
use tracing_subscriber::EnvFilter;

// =============================================================================
// Slots
// =============================================================================

/// Dictionaries and defaults per language.
const DATA: usize = 0;
/// The document being edited.
const Q: usize = 1;
/// Labels for the current language and document type.
const L: usize = 2;
/// Derived amounts.
const TOTALS: usize = 3;
/// Next line-item id.
const NEXT_ID: usize = 4;
const SLOTS: usize = 5;

const ITEM: usize = EachBlock::<i64>::item_slot(SLOTS);
const INDEX: usize = EachBlock::<i64>::index_slot(SLOTS);
/// Item slot of the language and document-type button rows.
const CHOICE: usize = EachBlock::<String>::item_slot(SLOTS);

const HEADER_FIELDS: &[(&str, &str)] = &[
    ("h2", "vendorName"),
    ("p", "vendorId"),
    ("p", "vendorAddress"),
];

const CLIENT_FIELDS: &[(&str, &str)] = &[
    ("h2", "clientName"),
    ("p", "clientId"),
    ("p", "clientAddress"),
];

fn data() -> Value {
    json!({
        "": {
            "font-style": "font-family: 'Kaushan Script', cursive;",
            "label": {
                "": {
                    "title": "Invoice", "ref": "No", "date": "Date", "duedate": "Due Date",
                    "client": "Bill to", "paymethod": "Payment", "itemNo": "No",
                    "itemDesc": "Description", "itemPrice": "Price", "itemQty": "Qty",
                    "itemAmount": "Amount", "totalAmount": "Subtotal", "totalVat": "Vat",
                    "totalWht": "Tax withheld", "totalAdjust": "Adjust", "totalFinal": "Pay Amount",
                    "note": "Note", "vendorSign": "Vendor Signature", "clientSign": "Client Signature"
                },
                "quotation": { "title": "Quotation", "duedate": "Offer Until", "client": "Offer to" },
                "receipt": {
                    "title": "Receipt", "client": "Received from",
                    "totalFinal": "Paid Amount", "vendorSign": "Receiver Signature"
                },
                "tax-invoice": { "title": "Tax Invoice" }
            },
            "q": {
                "lang": "", "doc": "", "currency": "$", "ref": "000001", "date": "2026-10-16",
                "duedate": "...", "vendorName": "Vendor Name", "vendorId": "Register",
                "vendorAddress": "Address", "clientName": "Client Name", "clientId": "Register",
                "clientAddress": "Address", "paymethod": "...", "vatRate": "0.05", "whtRate": "0",
                "totalAdjust": "", "note": ""
            }
        },
        "th": {
            "font-style": "font-family: 'Srisakdi', cursive; font-weight: 700;",
            "label": {
                "": {
                    "title": "ใบแจ้งหนี้", "ref": "เลขที่", "date": "วันที่", "duedate": "ชำระภายใน",
                    "client": "ส่งถึง", "paymethod": "วิธีชำระเงิน", "itemNo": "#",
                    "itemDesc": "รายการ", "itemPrice": "ราคา", "itemQty": "จำนวน",
                    "itemAmount": "จำนวนเงิน", "totalAmount": "รวม", "totalVat": "ภาษีมูลค่าเพิ่ม",
                    "totalWht": "หัก ณ ที่จ่าย", "totalAdjust": "ปรับปรุง", "totalFinal": "ยอดชำระ",
                    "note": "หมายเหตุ", "vendorSign": "ลายเซ็นผู้ขาย", "clientSign": "ลายเซ็นผู้ซื้อ"
                },
                "quotation": { "title": "ใบเสนอราคา", "duedate": "สั่งซื้อก่อนวันที่", "client": "ส่งถึง" },
                "receipt": {
                    "title": "ใบเสร็จรับเงิน", "client": "รับเงินจาก",
                    "totalFinal": "ยอดชำระ", "vendorSign": "ลายเซ็นผู้รับเงิน"
                },
                "tax-invoice": { "title": "ใบกำกับภาษี" }
            },
            "q": {
                "lang": "th", "doc": "", "currency": "฿", "ref": "000001", "date": "16/10/2569",
                "duedate": "...", "vendorName": "ชื่อผู้ขาย", "vendorId": "เลขประจำตัว",
                "vendorAddress": "ที่อยู่", "clientName": "ชื่อลูกค้า", "clientId": "เลขประจำตัว",
                "clientAddress": "ที่อยู่", "paymethod": "...", "vatRate": "0.07", "whtRate": "0",
                "totalAdjust": "", "note": ""
            }
        }
    })
}

// =============================================================================
// Formatting
// =============================================================================

fn number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `1234.5` → `"$ 1,234.50"`; zero renders empty.
fn price(value: f64, currency: &Value) -> String {
    if value == 0.0 || !value.is_finite() {
        return String::new();
    }
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::new();
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{} {sign}{grouped}.{cents}", text(currency))
}

fn qty(value: &Value) -> String {
    let n = number(value);
    if n == 0.0 { String::new() } else { n.to_string() }
}

/// `0.07` → `"7 %"`, `0.125` → `"12.50 %"`.
fn rate(value: &Value) -> String {
    let percent = number(value) * 100.0;
    let rounded = percent.round();
    if (percent - rounded).abs() < 1e-9 {
        format!("{rounded} %")
    } else {
        format!("{percent:.2} %")
    }
}

// =============================================================================
// Document
// =============================================================================

struct Invoice;

type CellFormat = fn(&[Value]) -> String;

fn set_field(doc: &WeakComponent, field: &'static str, value: Value) {
    doc.update(Q, |q| {
        if let Some(q) = q.as_object_mut() {
            q.insert(field.to_string(), value);
        }
    });
}

fn add_item(doc: &WeakComponent) {
    let id = doc.get(NEXT_ID).as_i64().unwrap_or_default();
    doc.update(Q, |q| {
        if let Some(items) = q.get_mut("items").and_then(Value::as_array_mut) {
            items.push(json!({ "id": id, "desc": "", "price": "", "qty": "" }));
        }
    });
    doc.set(NEXT_ID, json!(id + 1));
}

fn remove_item(doc: &WeakComponent, id: &Value) {
    doc.update(Q, |q| {
        if let Some(items) = q.get_mut("items").and_then(Value::as_array_mut) {
            items.retain(|item| item["id"] != *id);
        }
    });
}

impl Invoice {
    /// Element whose text shows `q[field]` and whose input writes it back.
    fn editable(t: &mut Template, parent: NodeRef, tag: &str, field: &'static str, doc: &WeakComponent) -> NodeRef {
        let node = t.element(Some(parent), tag);
        t.attr(node, "contenteditable", "true").attr(node, "data-field", field);
        t.dynamic_text(Some(node), &[Q], move |ctx| text(&ctx[Q][field]));
        let doc = doc.clone();
        t.on(node, "input", move |event, _ctx| set_field(&doc, field, event.detail.clone()));
        node
    }

    /// Labelled line: `<label>{l[key]}</label>` followed by `value`.
    fn labelled(
        t: &mut Template,
        parent: Option<NodeRef>,
        key: &'static str,
        value: impl Fn(&[Value]) -> String + 'static,
    ) -> NodeRef {
        let line = t.element(parent, "div");
        t.attr(line, "class", key);
        let name = t.element(Some(line), "label");
        t.dynamic_text(Some(name), &[L], move |ctx| text(&ctx[L][key]));
        let span = t.element(Some(line), "span");
        t.dynamic_text(Some(span), &[Q, TOTALS], value);
        span
    }

    /// Due date line; receipts have none.
    fn due_date(rt: &Runtime, doc: &WeakComponent) -> Box<dyn Fragment> {
        let mut t = Template::new(rt);
        let line = t.element(None, "div");
        let name = t.element(Some(line), "label");
        t.dynamic_text(Some(name), &[L], |ctx| text(&ctx[L]["duedate"]));
        Invoice::editable(&mut t, line, "p", "duedate", doc);
        Box::new(t.build())
    }

    /// Withholding line; only receipts carry one.
    fn withholding(rt: &Runtime) -> Box<dyn Fragment> {
        let mut t = Template::new(rt);
        Invoice::labelled(&mut t, None, "totalWht", |ctx| {
            format!(
                "{} {}",
                rate(&ctx[Q]["whtRate"]),
                price(number(&ctx[TOTALS]["wht"]), &ctx[Q]["currency"])
            )
        });
        Box::new(t.build())
    }

    fn language_row(rt: &Runtime, doc: WeakComponent) -> Box<dyn Fragment> {
        let mut t = Template::new(rt);
        let button = t.element(None, "button");
        t.dynamic_attr(button, "data-lang", &[CHOICE], |ctx| Some(text(&ctx[CHOICE])));
        t.dynamic_attr(button, "class", &[Q, CHOICE], |ctx| {
            (ctx[Q]["lang"] == ctx[CHOICE]).then(|| "active".to_string())
        });
        t.dynamic_text(Some(button), &[CHOICE], |ctx| match text(&ctx[CHOICE]) {
            lang if lang.is_empty() => "en".to_string(),
            lang => lang,
        });
        t.on(button, "click", move |_event, ctx| set_field(&doc, "lang", ctx[CHOICE].clone()));
        Box::new(t.build())
    }

    fn doc_type_row(rt: &Runtime, doc: WeakComponent) -> Box<dyn Fragment> {
        let mut t = Template::new(rt);
        let button = t.element(None, "button");
        t.dynamic_attr(button, "data-doc", &[CHOICE], |ctx| Some(text(&ctx[CHOICE])));
        t.dynamic_text(Some(button), &[DATA, Q, CHOICE], |ctx| {
            let lang = text(&ctx[Q]["lang"]);
            text(&ctx[DATA][lang]["label"][text(&ctx[CHOICE])]["title"])
        });
        t.on(button, "click", move |_event, ctx| set_field(&doc, "doc", ctx[CHOICE].clone()));
        Box::new(t.build())
    }

    fn item_row(rt: &Runtime, doc: WeakComponent) -> Box<dyn Fragment> {
        let mut t = Template::new(rt);
        let tr = t.element(None, "tr");

        let no = t.element(Some(tr), "td");
        t.dynamic_text(Some(no), &[INDEX], |ctx| {
            (ctx[INDEX].as_u64().unwrap_or_default() + 1).to_string()
        });

        let columns: [(&'static str, CellFormat); 3] = [
            ("desc", |ctx| text(&ctx[ITEM]["desc"])),
            ("price", |ctx| price(number(&ctx[ITEM]["price"]), &ctx[Q]["currency"])),
            ("qty", |ctx| qty(&ctx[ITEM]["qty"])),
        ];
        for (column, format) in columns {
            let td = t.element(Some(tr), "td");
            t.attr(td, "contenteditable", "true").attr(td, "data-column", column);
            t.dynamic_text(Some(td), &[Q, ITEM], format);
            let doc = doc.clone();
            t.on(td, "input", move |event, ctx| {
                let Some(index) = ctx[INDEX].as_u64() else { return };
                let detail = event.detail.clone();
                doc.update(Q, |q| {
                    let row = q
                        .get_mut("items")
                        .and_then(|items| items.get_mut(index as usize))
                        .and_then(Value::as_object_mut);
                    if let Some(row) = row {
                        row.insert(column.to_string(), detail);
                    }
                });
            });
        }

        let amount = t.element(Some(tr), "td");
        t.dynamic_text(Some(amount), &[Q, ITEM], |ctx| {
            let value = number(&ctx[ITEM]["price"]) * number(&ctx[ITEM]["qty"]);
            price(value, &ctx[Q]["currency"])
        });

        let cell = t.element(Some(tr), "td");
        let remove = t.element(Some(cell), "button");
        t.attr(remove, "class", "remove");
        t.text(Some(remove), "-");
        t.on(remove, "click", move |_event, ctx| remove_item(&doc, &ctx[ITEM]["id"]));

        Box::new(t.build())
    }
}

impl ComponentDef for Invoice {
    fn name(&self) -> &str {
        "Invoice"
    }

    fn slot_count(&self) -> usize {
        SLOTS
    }

    fn props(&self) -> &[(&'static str, usize)] {
        &[("data", DATA), ("q", Q)]
    }

    fn instance(&self, cx: &Component, _props: &Props) -> Result<()> {
        cx.set_default(DATA, data());
        if cx.get(Q).is_null() {
            let defaults = cx.get(DATA)[""]["q"].clone();
            cx.set(Q, defaults);
        }

        let rows = cx.get(Q)["items"].as_array().map_or(0, Vec::len);
        if rows == 0 {
            cx.update(Q, |q| {
                let items: Vec<Value> = (0..3)
                    .map(|id| json!({ "id": id, "desc": "", "price": "", "qty": "" }))
                    .collect();
                if let Some(q) = q.as_object_mut() {
                    q.insert("items".into(), Value::Array(items));
                }
            });
        }
        let next = cx.get(Q)["items"]
            .as_array()
            .and_then(|items| items.iter().filter_map(|item| item["id"].as_i64()).max())
            .map_or(0, |max| max + 1);
        cx.set(NEXT_ID, json!(next));

        let weak = cx.downgrade();
        on_mount(cx.runtime(), move || {
            let rows = weak.get(Q)["items"].as_array().map_or(0, Vec::len);
            tracing::info!(rows, "invoice mounted");
            None
        })
    }

    fn reactive(&self, cx: &Component, dirty: &DirtyMask) {
        if !dirty.any(&[DATA, Q]) {
            return;
        }
        let q = cx.get(Q);

        let amounts: Vec<f64> = q["items"]
            .as_array()
            .map(|items| items.iter().map(|item| number(&item["price"]) * number(&item["qty"])).collect())
            .unwrap_or_default();
        let subtotal: f64 = amounts.iter().sum();
        let vat = subtotal * number(&q["vatRate"]);
        let wht = subtotal * number(&q["whtRate"]);
        let final_amount = subtotal + vat + wht + number(&q["totalAdjust"]);
        cx.set(
            TOTALS,
            json!({ "subtotal": subtotal, "vat": vat, "wht": wht, "final": final_amount }),
        );

        let data = cx.get(DATA);
        let labels = &data[text(&q["lang"])]["label"];
        let mut merged: Map<String, Value> = labels[""].as_object().cloned().unwrap_or_default();
        if let Some(overrides) = labels[text(&q["doc"])].as_object() {
            merged.extend(overrides.clone());
        }
        cx.set(L, Value::Object(merged));
    }

    fn fragment(&self, cx: &Component) -> Option<Box<dyn Fragment>> {
        let rt = cx.runtime().clone();
        let doc = cx.downgrade();
        let mut t = Template::new(cx.runtime());

        let article = t.element(None, "article");
        t.dynamic_attr(article, "style", &[DATA, Q], |ctx| {
            ctx[DATA][text(&ctx[Q]["lang"])]["font-style"].as_str().map(str::to_string)
        });

        // Toolbar: languages and document types.
        let toolbar = t.element(Some(article), "nav");
        let (row_rt, row_doc) = (rt.clone(), doc.clone());
        t.each(
            Some(toolbar),
            EachBlock::new(
                &rt,
                &[DATA, Q],
                |ctx| ctx[DATA].as_object().map(|d| d.keys().map(|k| json!(k)).collect()).unwrap_or_default(),
                |item, _| text(item),
                move |_| Invoice::language_row(&row_rt, row_doc.clone()),
            ),
        );
        let (row_rt, row_doc) = (rt.clone(), doc.clone());
        t.each(
            Some(toolbar),
            EachBlock::new(
                &rt,
                &[DATA, Q],
                |ctx| {
                    ctx[DATA][text(&ctx[Q]["lang"])]["label"]
                        .as_object()
                        .map(|labels| labels.keys().map(|k| json!(k)).collect())
                        .unwrap_or_default()
                },
                |item, _| text(item),
                move |_| Invoice::doc_type_row(&row_rt, row_doc.clone()),
            ),
        );

        // Header: vendor, title, reference and date.
        let header = t.element(Some(article), "header");
        for &(tag, field) in HEADER_FIELDS {
            Invoice::editable(&mut t, header, tag, field, &doc);
        }
        let h1 = t.element(Some(header), "h1");
        t.dynamic_text(Some(h1), &[L], |ctx| text(&ctx[L]["title"]));
        for (key, field) in [("ref", "ref"), ("date", "date")] {
            let line = t.element(Some(header), "div");
            let name = t.element(Some(line), "label");
            t.dynamic_text(Some(name), &[L], move |ctx| text(&ctx[L][key]));
            Invoice::editable(&mut t, line, "span", field, &doc);
        }

        // Client block.
        let client = t.element(Some(article), "section");
        let client_label = t.element(Some(client), "h3");
        t.dynamic_text(Some(client_label), &[L], |ctx| text(&ctx[L]["client"]));
        for &(tag, field) in CLIENT_FIELDS {
            Invoice::editable(&mut t, client, tag, field, &doc);
        }
        let (due_rt, due_doc) = (rt.clone(), doc.clone());
        t.when(
            Some(client),
            IfBlock::new(
                &[Q, L],
                |ctx| ctx[Q]["doc"] != "receipt",
                move || Invoice::due_date(&due_rt, &due_doc),
            ),
        );
        let line = t.element(Some(client), "div");
        let name = t.element(Some(line), "label");
        t.dynamic_text(Some(name), &[L], |ctx| text(&ctx[L]["paymethod"]));
        Invoice::editable(&mut t, line, "p", "paymethod", &doc);

        // Line items.
        let table = t.element(Some(article), "table");
        let head = t.element(Some(table), "tr");
        for key in ["itemNo", "itemDesc", "itemPrice", "itemQty", "itemAmount"] {
            let th = t.element(Some(head), "th");
            t.dynamic_text(Some(th), &[L], move |ctx| text(&ctx[L][key]));
        }
        let tbody = t.element(Some(table), "tbody");
        let (row_rt, row_doc) = (rt.clone(), doc.clone());
        t.each(
            Some(tbody),
            EachBlock::new(
                &rt,
                &[Q],
                |ctx| ctx[Q]["items"].as_array().cloned().unwrap_or_default(),
                |item, _| item["id"].as_i64().unwrap_or_default(),
                move |_| Invoice::item_row(&row_rt, row_doc.clone()),
            ),
        );
        let add = t.element(Some(article), "button");
        t.attr(add, "class", "add");
        t.text(Some(add), "+");
        let add_doc = doc.clone();
        t.on(add, "click", move |_event, _ctx| add_item(&add_doc));

        // Totals.
        let totals = t.element(Some(article), "footer");
        Invoice::labelled(&mut t, Some(totals), "totalAmount", |ctx| {
            price(number(&ctx[TOTALS]["subtotal"]), &ctx[Q]["currency"])
        });
        Invoice::labelled(&mut t, Some(totals), "totalVat", |ctx| {
            format!(
                "{} {}",
                rate(&ctx[Q]["vatRate"]),
                price(number(&ctx[TOTALS]["vat"]), &ctx[Q]["currency"])
            )
        });
        let wht_rt = rt.clone();
        t.when(
            Some(totals),
            IfBlock::new(
                &[Q, L, TOTALS],
                |ctx| ctx[Q]["doc"] == "receipt",
                move || Invoice::withholding(&wht_rt),
            ),
        );
        let adjust = Invoice::labelled(&mut t, Some(totals), "totalAdjust", |ctx| {
            price(number(&ctx[Q]["totalAdjust"]), &ctx[Q]["currency"])
        });
        t.attr(adjust, "contenteditable", "true").attr(adjust, "data-field", "totalAdjust");
        let adjust_doc = doc.clone();
        t.on(adjust, "input", move |event, _ctx| {
            set_field(&adjust_doc, "totalAdjust", event.detail.clone())
        });
        Invoice::labelled(&mut t, Some(totals), "totalFinal", |ctx| {
            price(number(&ctx[TOTALS]["final"]), &ctx[Q]["currency"])
        });

        // Note and signatures.
        let note = t.element(Some(article), "aside");
        let note_label = t.element(Some(note), "label");
        t.dynamic_text(Some(note_label), &[L], |ctx| text(&ctx[L]["note"]));
        Invoice::editable(&mut t, note, "p", "note", &doc);
        for key in ["vendorSign", "clientSign"] {
            let sign = t.element(Some(article), "div");
            t.attr(sign, "class", "signature");
            t.dynamic_text(Some(sign), &[L], move |ctx| text(&ctx[L][key]));
        }

        Some(Box::new(t.build()))
    }
}

// =============================================================================
// Host
// =============================================================================

/// First element under `root` whose `attr` equals `value`.
fn find(dom: &Dom, root: NodeId, attr: &str, value: &str) -> Option<NodeId> {
    dom.children(root).into_iter().find_map(|child| {
        if dom.attr(child, attr).as_deref() == Some(value) {
            Some(child)
        } else {
            find(dom, child, attr, value)
        }
    })
}

fn nth(dom: &Dom, root: NodeId, attr: &str, value: &str, n: usize) -> Option<NodeId> {
    fn collect(dom: &Dom, root: NodeId, attr: &str, value: &str, out: &mut Vec<NodeId>) {
        for child in dom.children(root) {
            if dom.attr(child, attr).as_deref() == Some(value) {
                out.push(child);
            }
            collect(dom, child, attr, value, out);
        }
    }
    let mut out = Vec::new();
    collect(dom, root, attr, value, &mut out);
    out.get(n).copied()
}

fn step(rt: &Runtime, body: NodeId, title: &str, action: impl FnOnce(&Dom)) {
    action(rt.dom());
    let before = rt.scheduler().stats();
    rt.run_microtasks();
    let after = rt.scheduler().stats();
    let journal = rt.dom().take_journal();
    let moves = journal
        .iter()
        .filter(|mutation| matches!(mutation, Mutation::Move { .. }))
        .count();
    println!(
        "--- {title} ({} flush, {} updates, {} mutations, {moves} moves) ---",
        after.flushes - before.flushes,
        after.updates - before.updates,
        journal.len()
    );
    println!("{}\n", rt.dom().to_html(body));
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let rt = Runtime::with_config(RuntimeConfig {
        record_mutations: true,
        ..RuntimeConfig::from_env()
    });
    let body = rt.dom().create_element("body");

    let invoice = match Component::new(
        &rt,
        Rc::new(Invoice),
        ComponentOptions {
            target: Some(body),
            ..Default::default()
        },
    ) {
        Ok(invoice) => invoice,
        Err(err) => {
            eprintln!("invoice failed to start: {err}");
            return;
        }
    };

    rt.dom().take_journal();
    println!("=== spark-dom Invoice Example ===\n");
    println!("{}\n", rt.dom().to_html(body));

    step(&rt, body, "fill two line items", |dom| {
        for (row, (desc, price, qty)) in [("Design", "1200", "2"), ("Hosting", "45.5", "12")].into_iter().enumerate() {
            for (column, value) in [("desc", desc), ("price", price), ("qty", qty)] {
                if let Some(cell) = nth(dom, body, "data-column", column, row) {
                    dom.dispatch(cell, "input", json!(value));
                }
            }
        }
        if let Some(client) = find(dom, body, "data-field", "clientName") {
            dom.dispatch(client, "input", json!("ACME Co."));
        }
    });

    step(&rt, body, "remove the empty third row, add a fresh one", |dom| {
        if let Some(remove) = nth(dom, body, "class", "remove", 2) {
            dom.dispatch(remove, "click", Value::Null);
        }
        if let Some(add) = find(dom, body, "class", "add") {
            dom.dispatch(add, "click", Value::Null);
        }
    });

    step(&rt, body, "switch to a Thai receipt", |dom| {
        if let Some(th) = find(dom, body, "data-lang", "th") {
            dom.dispatch(th, "click", Value::Null);
        }
        if let Some(receipt) = find(dom, body, "data-doc", "receipt") {
            dom.dispatch(receipt, "click", Value::Null);
        }
    });

    let stats = rt.dom().stats();
    println!(
        "DOM: {} inserts, {} moves, {} removals, {} text writes",
        stats.inserts, stats.moves, stats.removals, stats.text_writes
    );
    println!("Pay amount: {}", invoice.get(TOTALS)["final"]);

    invoice.destroy();
    println!("After destroy: {}", rt.dom().to_html(body));
}
