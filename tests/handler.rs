use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use image::{Rgba, RgbaImage};
use pretty_assertions::assert_eq;

use clipcards::clipboard::{
    codec, ClipboardLock, Datum, Format, Handler, HandlerState, Item, MemoryClipboard, NativeClipboard, Payload,
};
use clipcards::config::LockSettings;
use clipcards::{Clip, ClipboardError};

fn settings(max_attempts: u32) -> LockSettings {
    LockSettings {
        attempt_timeout_ms: 2,
        max_attempts,
        release_grace_ms: 1,
    }
}

fn handler(clipboard: &MemoryClipboard, lock: &ClipboardLock) -> Handler<MemoryClipboard> {
    Handler::with_settings(clipboard.connect(), lock.clone(), settings(5))
}

fn unicode(text: &str) -> Vec<u8> {
    codec::encode(&Payload::from(text), &Format::new(Format::UNICODETEXT)).unwrap()
}

#[test]
fn write_then_read_returns_every_format() {
    let clipboard = MemoryClipboard::new();
    let mut handler = handler(&clipboard, &ClipboardLock::new());

    let mut image = RgbaImage::new(4, 4);
    image.put_pixel(0, 3, Rgba([0, 128, 255, 255]));
    let clip = Clip::from_item(Item::list([
        Item::from("hello"),
        Item::Datum(Datum::with_format(Some(vec![9u8, 8, 7].into()), Format::DIB)),
        Item::from(image.clone()),
    ]));
    assert!(clip.is_placeholder());

    assert_eq!(handler.write(&clip).unwrap(), 3);
    let read = handler.read().unwrap();

    assert!(!read.is_placeholder());
    assert_eq!(read.sequence(), i64::from(handler.current_seq()));
    assert_eq!(read.formats(), clip.formats());
    assert_eq!(read.find(Format::UNICODETEXT).unwrap().data, Some(Payload::from("hello")));
    assert_eq!(read.find(Format::DIB).unwrap().data, Some(Payload::Bytes(vec![9, 8, 7])));
    assert_eq!(read.find(Format::png()).unwrap().data, Some(Payload::Image(image)));
    assert_eq!(read.digest(), clip.digest());
}

#[test]
fn writing_nothing_reads_back_a_single_null() {
    let clipboard = MemoryClipboard::new();
    let mut handler = handler(&clipboard, &ClipboardLock::new());
    clipboard.external_write(&[(Format::UNICODETEXT, unicode("stale"))]);

    assert_eq!(handler.write(&Clip::from_item(Item::None)).unwrap(), 0);
    let read = handler.read().unwrap();
    assert_eq!(read.len(), 1);
    assert!(read[0].is_null());
    assert!(read[0].format.is_null());
}

#[test]
fn clearing_twice_advances_the_sequence_twice() {
    let clipboard = MemoryClipboard::new();
    let mut handler = handler(&clipboard, &ClipboardLock::new());
    handler.write(&Clip::from_item("something")).unwrap();

    let before = handler.current_seq();
    handler.clear().unwrap();
    let once = handler.current_seq();
    handler.clear().unwrap();
    let twice = handler.current_seq();

    assert!(once > before);
    assert!(twice > once);
    assert!(clipboard.contents().is_empty());
}

#[test]
fn sessions_on_a_shared_lock_never_overlap() {
    let clipboard = MemoryClipboard::new();
    let lock = ClipboardLock::new();
    let mut first = handler(&clipboard, &lock);
    let mut second = Handler::with_settings(clipboard.connect(), lock.clone(), settings(3));

    let (opened_tx, opened_rx) = mpsc::channel();
    let (done_tx, done_rx) = mpsc::channel::<()>();
    let holder = thread::spawn(move || {
        let session = first.open().unwrap();
        opened_tx.send(()).unwrap();
        done_rx.recv().unwrap();
        session.release().unwrap();
    });

    opened_rx.recv().unwrap();
    let err = second.read().unwrap_err();
    assert!(matches!(err, ClipboardError::LockTimeout { attempts: 3 }));
    assert_eq!(second.state(), HandlerState::Closed);

    done_tx.send(()).unwrap();
    holder.join().unwrap();
    assert!(second.read().is_ok());
}

#[test]
fn waiting_acquirer_gets_the_lock_once_released() {
    let clipboard = MemoryClipboard::new();
    let lock = ClipboardLock::new();
    let mut waiter = Handler::with_settings(
        clipboard.connect(),
        lock.clone(),
        LockSettings {
            attempt_timeout_ms: 50,
            max_attempts: 20,
            release_grace_ms: 0,
        },
    );

    let stray = lock.try_hold().unwrap();
    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        stray.release();
    });

    assert!(waiter.clear().is_ok());
    releaser.join().unwrap();
}

#[test]
fn another_owner_holding_the_clipboard_is_retried() {
    let clipboard = MemoryClipboard::new();
    let mut other_process = clipboard.connect();
    let mut handler = handler(&clipboard, &ClipboardLock::new());

    other_process.open().unwrap();
    assert!(matches!(
        handler.read(),
        Err(ClipboardError::LockTimeout { attempts: 5 })
    ));
    assert!(!handler.lock().is_held());

    other_process.close().unwrap();
    assert!(handler.read().is_ok());
}

#[test]
fn unretrievable_formats_read_as_null_datums() {
    let clipboard = MemoryClipboard::new();
    let mut handler = handler(&clipboard, &ClipboardLock::new());
    clipboard.external_write(&[
        (Format::UNICODETEXT, unicode("kept")),
        (Format::HDROP, b"files".to_vec()),
        (Format::METAFILEPICT, b"picture".to_vec()),
    ]);
    clipboard.make_unavailable(Format::HDROP);

    let read = handler.read().unwrap();
    assert_eq!(read.len(), 3);
    assert_eq!(read[0].data, Some(Payload::from("kept")));
    assert!(read[1].is_null());
    assert_eq!(read[1].format, Format::new(Format::HDROP));
    assert!(read[2].is_null());
    assert!(read[2].format.is_null());
}

#[test]
fn write_succeeds_if_any_item_is_set() {
    let clipboard = MemoryClipboard::new();
    let mut handler = handler(&clipboard, &ClipboardLock::new());
    clipboard.reject(Format::DIB);

    let clip = Datum::with_format(Some(vec![1u8].into()), Format::DIB) + "text survives";
    assert_eq!(handler.write(&clip).unwrap(), 1);
    assert_eq!(clipboard.contents(), vec![(Format::UNICODETEXT, unicode("text survives"))]);

    clipboard.reject(Format::UNICODETEXT);
    assert!(matches!(
        handler.write(&clip),
        Err(ClipboardError::WriteFailed { attempted: 2 })
    ));
    assert!(!handler.lock().is_held());
}

#[test]
fn forced_reset_recovers_from_a_crashed_holder() {
    let clipboard = MemoryClipboard::new();
    let lock = ClipboardLock::new();
    let mut handler = handler(&clipboard, &lock);

    let crashed = lock.try_hold().unwrap();
    std::mem::forget(crashed);
    assert!(handler.read().is_err());

    assert!(handler.force_reset());
    assert!(handler.read().is_ok());
    assert!(!handler.force_reset());
}
