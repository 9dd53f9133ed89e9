//! Localized chat replies.
//!
//! Every user-facing message exists in English, Polish and Russian. The
//! language for a chat comes from an explicit `/language` preference first,
//! then from the platform locale hint, then falls back to Russian.

use crate::compose::ComposeStats;
use crate::jobs::{JobErrorKind, PublishOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    En,
    Pl,
    Ru,
}

impl Lang {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Pl => "pl",
            Lang::Ru => "ru",
        }
    }

    /// Parses a locale hint like `en-US` or `pl`. Unknown hints map to Russian.
    pub fn from_code(code: &str) -> Lang {
        let lower = code.trim().to_ascii_lowercase();
        if lower == "en" || lower.starts_with("en-") {
            Lang::En
        } else if lower == "pl" || lower.starts_with("pl-") {
            Lang::Pl
        } else {
            Lang::Ru
        }
    }

    pub fn resolve(preference: Option<&str>, platform_code: Option<&str>) -> Lang {
        if let Some(pref) = preference {
            return Lang::from_code(pref);
        }
        match platform_code {
            Some(code) => Lang::from_code(code),
            None => Lang::Ru,
        }
    }
}

/// Escapes text interpolated into HTML-mode chat messages.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn welcome(lang: Lang) -> String {
    match lang {
        Lang::En => concat!(
            "<b>Newsdesk</b>\n",
            "Send me an article link or a text, and I will turn it into a published article.\n",
            "Type /help to see all commands."
        )
        .to_string(),
        Lang::Pl => concat!(
            "<b>Newsdesk</b>\n",
            "Wyślij mi link do artykułu albo tekst, a zamienię go w opublikowany artykuł.\n",
            "Wpisz /help, aby zobaczyć wszystkie komendy."
        )
        .to_string(),
        Lang::Ru => concat!(
            "<b>Newsdesk</b>\n",
            "Отправьте ссылку на статью или текст, и я превращу его в опубликованную статью.\n",
            "Наберите /help, чтобы увидеть все команды."
        )
        .to_string(),
    }
}

pub fn help_text(lang: Lang) -> String {
    match lang {
        Lang::En => concat!(
            "<b>Commands</b>\n",
            "/compose - start collecting a long text in parts\n",
            "/preview - show the collected text so far\n",
            "/done - finish composing and submit\n",
            "/cancel - drop the current compose or delete mode\n",
            "/single - merge the links in one message into one article\n",
            "/delete - remove a published article by URL\n",
            "/style - show or set the writing style\n",
            "/images - show or set images per article (0-3)\n",
            "/mode - single (merge links) or batch (one article per link)\n",
            "/language - show or set the reply language\n",
            "/settings - show your current preferences\n",
            "/status - bot and queue status\n",
            "/queue - queue statistics\n",
            "/job &lt;id&gt; - one job's status\n",
            "\n",
            "Anything else you send is treated as a submission: a URL is fetched ",
            "and rewritten, plain text is turned into an article directly."
        )
        .to_string(),
        Lang::Pl => concat!(
            "<b>Komendy</b>\n",
            "/compose - zbieranie długiego tekstu w częściach\n",
            "/preview - pokaż zebrany dotąd tekst\n",
            "/done - zakończ zbieranie i wyślij\n",
            "/cancel - przerwij zbieranie lub tryb usuwania\n",
            "/single - połącz linki z jednej wiadomości w jeden artykuł\n",
            "/delete - usuń opublikowany artykuł po URL\n",
            "/style - pokaż lub ustaw styl pisania\n",
            "/images - pokaż lub ustaw liczbę obrazów (0-3)\n",
            "/mode - single (łączy linki) albo batch (artykuł na link)\n",
            "/language - pokaż lub ustaw język odpowiedzi\n",
            "/settings - pokaż obecne ustawienia\n",
            "/status - status bota i kolejki\n",
            "/queue - statystyki kolejki\n",
            "/job &lt;id&gt; - status jednego zadania\n",
            "\n",
            "Wszystko inne traktuję jako zgłoszenie: URL pobieram i przepisuję, ",
            "zwykły tekst zamieniam w artykuł."
        )
        .to_string(),
        Lang::Ru => concat!(
            "<b>Команды</b>\n",
            "/compose - собрать длинный текст из частей\n",
            "/preview - показать собранный текст\n",
            "/done - завершить сборку и отправить\n",
            "/cancel - отменить сборку или режим удаления\n",
            "/single - объединить ссылки из сообщения в одну статью\n",
            "/delete - удалить опубликованную статью по URL\n",
            "/style - показать или задать стиль текста\n",
            "/images - показать или задать число изображений (0-3)\n",
            "/mode - single (объединять ссылки) или batch (статья на ссылку)\n",
            "/language - показать или задать язык ответов\n",
            "/settings - показать текущие настройки\n",
            "/status - состояние бота и очереди\n",
            "/queue - статистика очереди\n",
            "/job &lt;id&gt; - статус одной задачи\n",
            "\n",
            "Всё остальное считается заявкой: URL скачивается и переписывается, ",
            "обычный текст превращается в статью."
        )
        .to_string(),
    }
}

pub fn job_queued(lang: Lang, job_id: &str) -> String {
    let id = escape_html(job_id);
    match lang {
        Lang::En => format!(
            "Accepted. Job <code>{id}</code> is queued, I will post updates here."
        ),
        Lang::Pl => format!(
            "Przyjęto. Zadanie <code>{id}</code> jest w kolejce, dam znać tutaj."
        ),
        Lang::Ru => format!(
            "Принято. Задача <code>{id}</code> в очереди, обновления пришлю сюда."
        ),
    }
}

pub fn still_processing(lang: Lang) -> String {
    match lang {
        Lang::En => "Still processing. This one is taking a while, I will finish it in the background.".to_string(),
        Lang::Pl => "Nadal przetwarzam. To trwa dłużej niż zwykle, dokończę w tle.".to_string(),
        Lang::Ru => "Всё ещё обрабатываю. Это занимает больше времени, закончу в фоне.".to_string(),
    }
}

pub fn job_completed(lang: Lang, outcome: &PublishOutcome) -> String {
    let title = escape_html(&outcome.title);
    let category = escape_html(&outcome.category);
    let words = outcome.word_count;
    let secs = (outcome.elapsed_ms + 500) / 1_000;
    let primary = escape_html(&outcome.primary.url);
    let mut out = match lang {
        Lang::En => format!(
            "<b>Published:</b> {title}\nCategory: {category} | Words: {words} | {secs}s\n{primary}"
        ),
        Lang::Pl => format!(
            "<b>Opublikowano:</b> {title}\nKategoria: {category} | Słów: {words} | {secs}s\n{primary}"
        ),
        Lang::Ru => format!(
            "<b>Опубликовано:</b> {title}\nКатегория: {category} | Слов: {words} | {secs} с\n{primary}"
        ),
    };
    if let Some(edition) = outcome.secondary.as_ref() {
        let secondary = escape_html(&edition.url);
        let label = match lang {
            Lang::En => "Translation",
            Lang::Pl => "Tłumaczenie",
            Lang::Ru => "Перевод",
        };
        out.push_str(&format!("\n{label}: {secondary}"));
    }
    out
}

pub fn job_failed(lang: Lang, kind: JobErrorKind) -> String {
    match (lang, kind) {
        (Lang::En, JobErrorKind::Generation) => {
            "Could not generate the article text. Try again or send a different source.".to_string()
        }
        (Lang::En, JobErrorKind::Parsing) => {
            "Could not read that page. Check the link or paste the text directly.".to_string()
        }
        (Lang::En, JobErrorKind::Publication) => {
            "The article was generated but publishing failed. Try again in a minute.".to_string()
        }
        (Lang::En, JobErrorKind::Unknown) => {
            "Something went wrong while processing. Try again.".to_string()
        }
        (Lang::Pl, JobErrorKind::Generation) => {
            "Nie udało się wygenerować tekstu artykułu. Spróbuj ponownie albo wyślij inne źródło.".to_string()
        }
        (Lang::Pl, JobErrorKind::Parsing) => {
            "Nie udało się odczytać tej strony. Sprawdź link albo wklej tekst bezpośrednio.".to_string()
        }
        (Lang::Pl, JobErrorKind::Publication) => {
            "Artykuł powstał, ale publikacja się nie udała. Spróbuj za chwilę.".to_string()
        }
        (Lang::Pl, JobErrorKind::Unknown) => {
            "Coś poszło nie tak podczas przetwarzania. Spróbuj ponownie.".to_string()
        }
        (Lang::Ru, JobErrorKind::Generation) => {
            "Не удалось сгенерировать текст статьи. Попробуйте ещё раз или пришлите другой источник.".to_string()
        }
        (Lang::Ru, JobErrorKind::Parsing) => {
            "Не удалось прочитать эту страницу. Проверьте ссылку или пришлите текст напрямую.".to_string()
        }
        (Lang::Ru, JobErrorKind::Publication) => {
            "Статья готова, но публикация не удалась. Попробуйте через минуту.".to_string()
        }
        (Lang::Ru, JobErrorKind::Unknown) => {
            "Что-то пошло не так при обработке. Попробуйте ещё раз.".to_string()
        }
    }
}

pub fn rate_limited(lang: Lang, retry_after_secs: u64) -> String {
    match lang {
        Lang::En => format!("Too many requests. Try again in {retry_after_secs}s."),
        Lang::Pl => format!("Za dużo żądań. Spróbuj ponownie za {retry_after_secs}s."),
        Lang::Ru => format!("Слишком много запросов. Попробуйте через {retry_after_secs} с."),
    }
}

pub fn text_too_short(lang: Lang, minimum: usize, current: usize) -> String {
    match lang {
        Lang::En => format!(
            "<b>Text is too short</b>\nMinimum: {minimum} characters\nCurrent: {current}\nOr send a URL to parse."
        ),
        Lang::Pl => format!(
            "<b>Tekst jest za krótki</b>\nMinimum: {minimum} znaków\nObecnie: {current}\nAlbo wyślij URL do pobrania."
        ),
        Lang::Ru => format!(
            "<b>Текст слишком короткий</b>\nМинимум: {minimum} символов\nСейчас: {current}\nЛибо отправьте ссылку на статью."
        ),
    }
}

pub fn compose_started(lang: Lang) -> String {
    match lang {
        Lang::En => "Compose mode. Send the text in parts, then /done to submit or /cancel to drop it.".to_string(),
        Lang::Pl => "Tryb zbierania. Wysyłaj tekst w częściach, potem /done aby wysłać albo /cancel aby przerwać.".to_string(),
        Lang::Ru => "Режим сборки. Присылайте текст частями, затем /done чтобы отправить или /cancel чтобы отменить.".to_string(),
    }
}

pub fn compose_part_added(lang: Lang, stats: ComposeStats) -> String {
    let count = stats.message_count;
    let chars = stats.total_chars;
    match lang {
        Lang::En => format!("Part {count} saved ({chars} characters so far). /done when finished."),
        Lang::Pl => format!("Część {count} zapisana ({chars} znaków do tej pory). /done gdy skończysz."),
        Lang::Ru => format!("Часть {count} сохранена (символов пока: {chars}). /done когда закончите."),
    }
}

pub fn compose_preview(lang: Lang, text: &str, stats: ComposeStats) -> String {
    const PREVIEW_CHARS: usize = 500;
    let shown: String = text.chars().take(PREVIEW_CHARS).collect();
    let truncated = text.chars().count() > PREVIEW_CHARS;
    let body = escape_html(&shown);
    let suffix = if truncated { "..." } else { "" };
    let count = stats.message_count;
    let chars = stats.total_chars;
    let secs = stats.duration_secs;
    match lang {
        Lang::En => format!(
            "<b>Preview</b> ({count} parts, {chars} characters, {secs}s)\n\n{body}{suffix}"
        ),
        Lang::Pl => format!(
            "<b>Podgląd</b> ({count} części, {chars} znaków, {secs}s)\n\n{body}{suffix}"
        ),
        Lang::Ru => format!(
            "<b>Предпросмотр</b> (частей: {count}, символов: {chars}, {secs}с)\n\n{body}{suffix}"
        ),
    }
}

pub fn compose_empty(lang: Lang) -> String {
    match lang {
        Lang::En => "Nothing composed yet. Send some text first, or /cancel.".to_string(),
        Lang::Pl => "Jeszcze nic nie zebrano. Najpierw wyślij tekst, albo /cancel.".to_string(),
        Lang::Ru => "Пока ничего не собрано. Сначала пришлите текст, или /cancel.".to_string(),
    }
}

pub fn compose_cancelled(lang: Lang) -> String {
    match lang {
        Lang::En => "Compose cancelled, the collected parts were dropped.".to_string(),
        Lang::Pl => "Zbieranie anulowane, zebrane części zostały odrzucone.".to_string(),
        Lang::Ru => "Сборка отменена, собранные части удалены.".to_string(),
    }
}

pub fn nothing_to_cancel(lang: Lang) -> String {
    match lang {
        Lang::En => "Nothing to cancel.".to_string(),
        Lang::Pl => "Nie ma czego anulować.".to_string(),
        Lang::Ru => "Отменять нечего.".to_string(),
    }
}

pub fn delete_armed(lang: Lang) -> String {
    match lang {
        Lang::En => "Delete mode. Send the URL of the article to remove (valid for 5 minutes), or /cancel.".to_string(),
        Lang::Pl => "Tryb usuwania. Wyślij URL artykułu do usunięcia (ważne 5 minut), albo /cancel.".to_string(),
        Lang::Ru => "Режим удаления. Пришлите URL статьи для удаления (действует 5 минут), или /cancel.".to_string(),
    }
}

pub fn delete_done(lang: Lang, slug: &str) -> String {
    let slug = escape_html(slug);
    match lang {
        Lang::En => format!("Removed <code>{slug}</code> in both languages."),
        Lang::Pl => format!("Usunięto <code>{slug}</code> w obu językach."),
        Lang::Ru => format!("Удалено <code>{slug}</code> на обоих языках."),
    }
}

pub fn delete_failed(lang: Lang) -> String {
    match lang {
        Lang::En => "Could not remove that article. Check the URL and try again.".to_string(),
        Lang::Pl => "Nie udało się usunąć tego artykułu. Sprawdź URL i spróbuj ponownie.".to_string(),
        Lang::Ru => "Не удалось удалить эту статью. Проверьте URL и попробуйте ещё раз.".to_string(),
    }
}

pub fn invalid_url(lang: Lang) -> String {
    match lang {
        Lang::En => "That does not look like an article URL. Send a full http(s) link.".to_string(),
        Lang::Pl => "To nie wygląda na URL artykułu. Wyślij pełny link http(s).".to_string(),
        Lang::Ru => "Это не похоже на URL статьи. Пришлите полную ссылку http(s).".to_string(),
    }
}

pub fn duplicate_submission(lang: Lang) -> String {
    match lang {
        Lang::En => "I just received that one, still working on it.".to_string(),
        Lang::Pl => "Dopiero co to dostałem, wciąż nad tym pracuję.".to_string(),
        Lang::Ru => "Это только что пришло, я ещё работаю над ним.".to_string(),
    }
}

pub fn cancelled(lang: Lang) -> String {
    match lang {
        Lang::En => "Cancelled.".to_string(),
        Lang::Pl => "Anulowano.".to_string(),
        Lang::Ru => "Отменено.".to_string(),
    }
}

pub fn unknown_command(lang: Lang) -> String {
    match lang {
        Lang::En => "Unknown command. Type /help to see what I understand.".to_string(),
        Lang::Pl => "Nieznana komenda. Wpisz /help, aby zobaczyć, co rozumiem.".to_string(),
        Lang::Ru => "Неизвестная команда. Наберите /help, чтобы увидеть список.".to_string(),
    }
}

pub fn style_current(lang: Lang, current: &str, options: &str) -> String {
    match lang {
        Lang::En => format!("Current style: <b>{current}</b>. Options: {options}."),
        Lang::Pl => format!("Obecny styl: <b>{current}</b>. Opcje: {options}."),
        Lang::Ru => format!("Текущий стиль: <b>{current}</b>. Варианты: {options}."),
    }
}

pub fn style_set(lang: Lang, style: &str) -> String {
    match lang {
        Lang::En => format!("Style set to <b>{style}</b>."),
        Lang::Pl => format!("Styl ustawiony na <b>{style}</b>."),
        Lang::Ru => format!("Стиль установлен: <b>{style}</b>."),
    }
}

pub fn style_unknown(lang: Lang, options: &str) -> String {
    match lang {
        Lang::En => format!("I do not know that style. Options: {options}."),
        Lang::Pl => format!("Nie znam takiego stylu. Opcje: {options}."),
        Lang::Ru => format!("Такого стиля нет. Варианты: {options}."),
    }
}

pub fn images_current(lang: Lang, count: usize) -> String {
    match lang {
        Lang::En => format!("Images per article: <b>{count}</b>. Allowed: 0, 1, 2, 3."),
        Lang::Pl => format!("Obrazy na artykuł: <b>{count}</b>. Dozwolone: 0, 1, 2, 3."),
        Lang::Ru => format!("Изображений на статью: <b>{count}</b>. Допустимо: 0, 1, 2, 3."),
    }
}

pub fn images_set(lang: Lang, count: usize) -> String {
    match lang {
        Lang::En => format!("Images per article set to <b>{count}</b>."),
        Lang::Pl => format!("Liczba obrazów ustawiona na <b>{count}</b>."),
        Lang::Ru => format!("Число изображений: <b>{count}</b>."),
    }
}

pub fn images_invalid(lang: Lang) -> String {
    match lang {
        Lang::En => "Invalid value. Use /images 0..3.".to_string(),
        Lang::Pl => "Nieprawidłowa wartość. Użyj /images 0..3.".to_string(),
        Lang::Ru => "Некорректное значение. Используйте /images 0..3.".to_string(),
    }
}

pub fn mode_current(lang: Lang, combine_links: bool) -> String {
    let mode = if combine_links { "single" } else { "batch" };
    match lang {
        Lang::En => format!(
            "Multi URL mode: <b>{mode}</b>. single merges every link in a message into one article, batch makes a separate article per link."
        ),
        Lang::Pl => format!(
            "Tryb multi URL: <b>{mode}</b>. single łączy wszystkie linki z wiadomości w jeden artykuł, batch robi osobny artykuł z każdego linku."
        ),
        Lang::Ru => format!(
            "Режим multi URL: <b>{mode}</b>. single объединяет все ссылки из сообщения в одну статью, batch делает отдельную статью из каждой ссылки."
        ),
    }
}

pub fn mode_set(lang: Lang, combine_links: bool) -> String {
    match (lang, combine_links) {
        (Lang::En, true) => "Mode set to <b>single</b>: links in one message merge into one article.".to_string(),
        (Lang::En, false) => "Mode set to <b>batch</b>: each link becomes its own article.".to_string(),
        (Lang::Pl, true) => "Tryb <b>single</b>: linki z jednej wiadomości łączą się w jeden artykuł.".to_string(),
        (Lang::Pl, false) => "Tryb <b>batch</b>: każdy link staje się osobnym artykułem.".to_string(),
        (Lang::Ru, true) => "Режим <b>single</b>: ссылки из одного сообщения объединяются в одну статью.".to_string(),
        (Lang::Ru, false) => "Режим <b>batch</b>: каждая ссылка становится отдельной статьёй.".to_string(),
    }
}

pub fn mode_invalid(lang: Lang) -> String {
    match lang {
        Lang::En => "Invalid mode. Use: single or batch.".to_string(),
        Lang::Pl => "Nieprawidłowy tryb. Użyj: single albo batch.".to_string(),
        Lang::Ru => "Некорректный режим. Используйте: single или batch.".to_string(),
    }
}

pub fn single_usage(lang: Lang) -> String {
    match lang {
        Lang::En => "<b>One article from several links</b>\nExample: /single https://site.com/a https://site.com/b".to_string(),
        Lang::Pl => "<b>Jeden artykuł z wielu linków</b>\nPrzykład: /single https://site.com/a https://site.com/b".to_string(),
        Lang::Ru => "<b>Одна статья из нескольких ссылок</b>\nПример: /single https://site.com/a https://site.com/b".to_string(),
    }
}

pub fn lang_current(lang: Lang, code: &str) -> String {
    match lang {
        Lang::En => format!("Reply language: <b>{code}</b>. Options: en, pl, ru."),
        Lang::Pl => format!("Język odpowiedzi: <b>{code}</b>. Opcje: en, pl, ru."),
        Lang::Ru => format!("Язык ответов: <b>{code}</b>. Варианты: en, pl, ru."),
    }
}

pub fn lang_set(lang: Lang) -> String {
    match lang {
        Lang::En => "Replying in English from now on.".to_string(),
        Lang::Pl => "Od teraz odpowiadam po polsku.".to_string(),
        Lang::Ru => "Теперь отвечаю по-русски.".to_string(),
    }
}

pub fn settings_summary(
    lang: Lang,
    style: &str,
    images: usize,
    combine_links: bool,
    language_code: &str,
) -> String {
    let style = escape_html(style);
    let mode = if combine_links { "single" } else { "batch" };
    match lang {
        Lang::En => format!(
            "<b>Settings</b>\nStyle: {style}\nImages per article: {images}\nMulti URL mode: {mode}\nReply language: {language_code}"
        ),
        Lang::Pl => format!(
            "<b>Ustawienia</b>\nStyl: {style}\nObrazy na artykuł: {images}\nTryb multi URL: {mode}\nJęzyk odpowiedzi: {language_code}"
        ),
        Lang::Ru => format!(
            "<b>Настройки</b>\nСтиль: {style}\nИзображений на статью: {images}\nРежим multi URL: {mode}\nЯзык ответов: {language_code}"
        ),
    }
}

pub fn job_usage(lang: Lang) -> String {
    match lang {
        Lang::En => "Usage: /job &lt;id&gt;. The id is in the queued confirmation.".to_string(),
        Lang::Pl => "Użycie: /job &lt;id&gt;. Id znajdziesz w potwierdzeniu z kolejki.".to_string(),
        Lang::Ru => "Использование: /job &lt;id&gt;. Id есть в подтверждении очереди.".to_string(),
    }
}

pub fn job_not_found(lang: Lang, job_id: &str) -> String {
    let id = escape_html(job_id);
    match lang {
        Lang::En => format!("No job <code>{id}</code>. It may have expired, finished jobs are kept for 30 minutes."),
        Lang::Pl => format!("Brak zadania <code>{id}</code>. Mogło wygasnąć, zakończone zadania trzymam 30 minut."),
        Lang::Ru => format!("Нет задачи <code>{id}</code>. Возможно, она устарела, завершённые задачи хранятся 30 минут."),
    }
}

pub fn job_in_progress(lang: Lang, job_id: &str, processing: bool) -> String {
    let id = escape_html(job_id);
    match (lang, processing) {
        (Lang::En, true) => format!("Job <code>{id}</code> is processing."),
        (Lang::En, false) => format!("Job <code>{id}</code> is queued."),
        (Lang::Pl, true) => format!("Zadanie <code>{id}</code> jest w trakcie przetwarzania."),
        (Lang::Pl, false) => format!("Zadanie <code>{id}</code> czeka w kolejce."),
        (Lang::Ru, true) => format!("Задача <code>{id}</code> обрабатывается."),
        (Lang::Ru, false) => format!("Задача <code>{id}</code> ждёт в очереди."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_hints_resolve_with_russian_fallback() {
        assert_eq!(Lang::from_code("en"), Lang::En);
        assert_eq!(Lang::from_code("en-US"), Lang::En);
        assert_eq!(Lang::from_code("PL"), Lang::Pl);
        assert_eq!(Lang::from_code("de"), Lang::Ru);
        assert_eq!(Lang::from_code(""), Lang::Ru);
    }

    #[test]
    fn explicit_preference_beats_platform_code() {
        assert_eq!(Lang::resolve(Some("pl"), Some("en")), Lang::Pl);
        assert_eq!(Lang::resolve(None, Some("en-GB")), Lang::En);
        assert_eq!(Lang::resolve(None, None), Lang::Ru);
    }

    #[test]
    fn html_escaping_covers_angle_brackets_and_ampersands() {
        assert_eq!(escape_html("a<b>&c"), "a&lt;b&gt;&amp;c");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn completed_message_includes_translation_line_only_when_present() {
        let mut outcome = PublishOutcome {
            title: "Title".to_string(),
            category: "tech".to_string(),
            word_count: 480,
            image_count: 2,
            elapsed_ms: 7_200,
            primary: crate::jobs::PublishedRef {
                post_id: "1".to_string(),
                url: "https://x/en/a".to_string(),
                language: "en".to_string(),
            },
            secondary: Some(crate::jobs::PublishedRef {
                post_id: "2".to_string(),
                url: "https://x/pl/a".to_string(),
                language: "pl".to_string(),
            }),
        };
        let with = job_completed(Lang::En, &outcome);
        assert!(with.contains("Category: tech | Words: 480 | 7s"));
        assert!(with.contains("Translation: https://x/pl/a"));

        outcome.secondary = None;
        let without = job_completed(Lang::En, &outcome);
        assert!(!without.contains("Translation"));
    }

    #[test]
    fn compose_preview_truncates_long_text() {
        let stats = ComposeStats {
            message_count: 3,
            total_chars: 900,
            duration_secs: 45,
        };
        let long = "x".repeat(900);
        let message = compose_preview(Lang::En, &long, stats);
        assert!(message.contains("3 parts, 900 characters, 45s"));
        assert!(message.ends_with("..."));
        let short = compose_preview(Lang::En, "short text", stats);
        assert!(short.ends_with("short text"));
    }
}
