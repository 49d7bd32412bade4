//! XML bodies and response parsing for the WebDAV requests.

use std::io::Cursor;

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};

const DAV_NS: &str = "DAV:";
const CALDAV_NS: &str = "urn:ietf:params:xml:ns:caldav";

/// A calendar collection discovered through PROPFIND.
#[derive(Debug, Clone)]
pub struct DiscoveredCalendar {
    /// The collection's href (path on the server).
    pub href: String,
    /// The display name, when the server reports one.
    pub display_name: Option<String>,
}

/// PROPFIND body requesting the properties needed to identify calendars.
pub fn propfind_calendars_body() -> String {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut propfind = BytesStart::new("d:propfind");
    propfind.push_attribute(("xmlns:d", DAV_NS));
    propfind.push_attribute(("xmlns:c", CALDAV_NS));
    write_start(&mut writer, propfind);

    write_start(&mut writer, BytesStart::new("d:prop"));
    write_empty(&mut writer, "d:displayname");
    write_empty(&mut writer, "d:resourcetype");
    write_end(&mut writer, "d:prop");

    write_end(&mut writer, "d:propfind");

    into_string(writer)
}

/// REPORT body: a calendar-query with a VEVENT time-range filter.
///
/// The time-range makes the server expand recurring events into instances
/// inside the window.
pub fn calendar_query_body(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut query = BytesStart::new("c:calendar-query");
    query.push_attribute(("xmlns:d", DAV_NS));
    query.push_attribute(("xmlns:c", CALDAV_NS));
    write_start(&mut writer, query);

    write_start(&mut writer, BytesStart::new("d:prop"));
    write_empty(&mut writer, "d:getetag");
    write_empty(&mut writer, "c:calendar-data");
    write_end(&mut writer, "d:prop");

    write_start(&mut writer, BytesStart::new("c:filter"));

    let mut vcal = BytesStart::new("c:comp-filter");
    vcal.push_attribute(("name", "VCALENDAR"));
    write_start(&mut writer, vcal);

    let mut vevent = BytesStart::new("c:comp-filter");
    vevent.push_attribute(("name", "VEVENT"));
    write_start(&mut writer, vevent);

    let mut time_range = BytesStart::new("c:time-range");
    time_range.push_attribute(("start", format_caldav_datetime(start).as_str()));
    time_range.push_attribute(("end", format_caldav_datetime(end).as_str()));
    let _ = writer.write_event(Event::Empty(time_range));

    write_end(&mut writer, "c:comp-filter");
    write_end(&mut writer, "c:comp-filter");
    write_end(&mut writer, "c:filter");
    write_end(&mut writer, "c:calendar-query");

    into_string(writer)
}

/// Parses a PROPFIND multistatus response into calendar collections.
///
/// Only responses whose resourcetype contains a `calendar` element count;
/// plain WebDAV collections (the home itself, inbox/outbox) are skipped.
pub fn parse_propfind_response(xml: &str) -> Vec<DiscoveredCalendar> {
    let mut calendars = Vec::new();

    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current_href: Option<String> = None;
    let mut current_displayname: Option<String> = None;
    let mut is_calendar = false;
    let mut current_element: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match local_name(&name) {
                    "response" => {
                        current_href = None;
                        current_displayname = None;
                        is_calendar = false;
                    }
                    local @ ("href" | "displayname") => {
                        current_element = Some(local.to_string());
                    }
                    "calendar" => is_calendar = true,
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if local_name(&name) == "response" {
                    if is_calendar && let Some(href) = current_href.take() {
                        calendars.push(DiscoveredCalendar {
                            href,
                            display_name: current_displayname.take(),
                        });
                    }
                }
                current_element = None;
            }
            Ok(Event::Text(e)) => {
                if let Some(ref elem) = current_element {
                    let text = e.unescape().unwrap_or_default().to_string();
                    match elem.as_str() {
                        "href" => current_href = Some(text),
                        "displayname" => current_displayname = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    calendars
}

/// Parses a REPORT multistatus response into `(href, ics_data)` pairs.
pub fn parse_report_response(xml: &str) -> Vec<(String, String)> {
    let mut results = Vec::new();

    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current_href: Option<String> = None;
    let mut current_data: Option<String> = None;
    let mut current_element: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match local_name(&name) {
                    "response" => {
                        current_href = None;
                        current_data = None;
                    }
                    local @ ("href" | "calendar-data") => {
                        current_element = Some(local.to_string());
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if local_name(&name) == "response" {
                    if let (Some(href), Some(data)) = (current_href.take(), current_data.take()) {
                        results.push((href, data));
                    }
                }
                current_element = None;
            }
            Ok(Event::Text(e)) => {
                if let Some(ref elem) = current_element {
                    let text = e.unescape().unwrap_or_default().to_string();
                    match elem.as_str() {
                        "href" => current_href = Some(text),
                        "calendar-data" => current_data = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(ref elem) = current_element {
                    let text = String::from_utf8_lossy(&e).to_string();
                    match elem.as_str() {
                        "href" => current_href = Some(text),
                        "calendar-data" => current_data = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    results
}

fn write_start(writer: &mut Writer<Cursor<Vec<u8>>>, start: BytesStart<'_>) {
    let _ = writer.write_event(Event::Start(start));
}

fn write_end(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str) {
    let _ = writer.write_event(Event::End(BytesEnd::new(name)));
}

fn write_empty(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str) {
    let _ = writer.write_event(Event::Empty(BytesStart::new(name)));
}

fn into_string(writer: Writer<Cursor<Vec<u8>>>) -> String {
    String::from_utf8(writer.into_inner().into_inner()).unwrap_or_default()
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// iCalendar UTC datetime form used in time-range filters.
fn format_caldav_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}
